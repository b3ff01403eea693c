// Copyright (c) 2026 Ledgerflow
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Responder side of every protocol.
//!
//! A counterparty never trusts the initiator's claim that a proposal is valid. Before signing
//! it checks the attached signatures, resolves the consumed states against its own vault and
//! runs the same contract verification the builder ran.

use super::{
    wire::{AttestRequest, AttestResponse, FinalityAck, FinalityRequest, SignRequest, SignResponse},
    FlowError, Node,
};
use crate::core::{
    ledger::{
        contract,
        states::StateAndRef,
        transaction::{LedgerTransaction, ResolutionError, SignedTransaction},
    },
    oracle::validator::AttestationError,
    types::Party,
};
use crate::networking::transport::{IncomingSession, Protocol, Session};
use tracing::{info, warn};

impl Node {
    /// Run the responder for one inbound session.
    pub async fn respond(&self, incoming: IncomingSession) -> Result<(), FlowError> {
        let IncomingSession { protocol, session } = incoming;
        match protocol {
            Protocol::SignTransaction => self.respond_sign(session).await,
            Protocol::Finality => self.respond_finality(session).await,
            Protocol::OracleAttestation => self.respond_attest(session).await,
        }
    }

    async fn respond_sign(&self, mut session: Session) -> Result<(), FlowError> {
        let req: SignRequest = session.receive().await?;
        let peer = session.peer().clone();
        let verdict = self.check_proposal(&peer, &req).and_then(|()| self.sign_id(&req.stx));
        match verdict {
            Ok(sig) => {
                info!(party = %self.identity, tx_id = %req.stx.id, initiator = %peer, "signed proposal");
                session.send(&SignResponse::Signed(sig)).await?;
                Ok(())
            }
            Err(e) => {
                warn!(party = %self.identity, tx_id = %req.stx.id, initiator = %peer, error = %e, "rejecting proposal");
                session.send(&SignResponse::Rejected(e.to_string())).await?;
                Err(e)
            }
        }
    }

    /// Every check a signer performs before adding its signature.
    pub fn check_proposal(&self, initiator: &Party, req: &SignRequest) -> Result<(), FlowError> {
        let stx = &req.stx;
        // Validate whatever is attached; completeness is the initiator's concern.
        stx.verify_signatures_except(&stx.tx.required_signers())?;
        if !stx.signers().contains(&initiator.owning_key) {
            return Err(FlowError::Signature(format!("{initiator} has not signed its own proposal")));
        }
        if !stx.tx.required_signers().contains(&self.identity.owning_key) {
            return Err(FlowError::MalformedProposal(format!("{} is not a required signer", self.identity)));
        }
        if !self.network_map.notaries().contains(&stx.tx.notary) {
            return Err(FlowError::NoMatchingNotary(stx.tx.notary.name.clone()));
        }
        let ltx = self.resolve_inputs(stx, &req.inputs)?;
        contract::verify(&ltx)?;
        Ok(())
    }

    /// Attach the shipped consumed states, refusing any that our vault knows as spent or as
    /// something else.
    fn resolve_inputs(
        &self,
        stx: &SignedTransaction,
        shipped: &[StateAndRef],
    ) -> Result<LedgerTransaction, FlowError> {
        for s in shipped.iter() {
            let Some(rec) = self.vault.get(&s.reference)? else { continue; };
            if rec.consumed_by.is_some_and(|by| by != stx.id) {
                return Err(ResolutionError::Consumed(s.reference).into());
            }
            if rec.state != *s {
                return Err(ResolutionError::Conflicting(s.reference).into());
            }
        }
        Ok(stx.tx.resolve(shipped.to_vec())?)
    }

    async fn respond_finality(&self, mut session: Session) -> Result<(), FlowError> {
        let req: FinalityRequest = session.receive().await?;
        match self.accept_final(&req) {
            Ok(n) => {
                info!(party = %self.identity, tx_id = %req.stx.id, states = n, "recorded finalised transaction");
                session.send(&FinalityAck::Recorded(n)).await?;
                Ok(())
            }
            Err(e) => {
                warn!(party = %self.identity, tx_id = %req.stx.id, error = %e, "refusing to record");
                session.send(&FinalityAck::Rejected(e.to_string())).await?;
                Err(e)
            }
        }
    }

    fn accept_final(&self, req: &FinalityRequest) -> Result<usize, FlowError> {
        let stx = &req.stx;
        stx.verify_required_signatures()?;
        if !stx.is_notarised() {
            return Err(FlowError::Signature("transaction is not notarised".into()));
        }
        let ltx = self.resolve_inputs(stx, &req.inputs)?;
        contract::verify(&ltx)?;
        if !stx.participants(&req.inputs).contains(&self.identity) {
            return Err(FlowError::MalformedProposal(format!("{} is not a participant", self.identity)));
        }
        let recorded = self.vault.record_transaction(stx, &self.identity)?;
        self.metrics.states_recorded_total.inc_by(recorded.len() as u64);
        Ok(recorded.len())
    }

    async fn respond_attest(&self, mut session: Session) -> Result<(), FlowError> {
        let req: AttestRequest = session.receive().await?;
        let outcome = match &self.oracle {
            Some(oracle) => oracle.attest(&req.view).await,
            None => Err(AttestationError::InvalidAttestation(format!("{} is not an oracle", self.identity))),
        };
        match outcome {
            Ok(sig) => {
                session.send(&AttestResponse::Signed(sig)).await?;
                Ok(())
            }
            Err(e) => {
                session.send(&AttestResponse::Rejected(e.clone())).await?;
                Err(e.into())
            }
        }
    }
}
