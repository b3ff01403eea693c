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

//! Initiator side of oracle attestation.

use super::{
    checkpoint::{Checkpoint, FlowStep},
    wire::{AttestRequest, AttestResponse},
    FlowError, Node,
};
use crate::core::{
    ledger::{
        filtered::FilteredView,
        transaction::{CommandData, SignatureScope, SignedTransaction},
    },
    security::keystore::verify_pubkey_bytes,
    types::Party,
};
use crate::networking::transport::Protocol;
use tracing::{info, warn};

/// Reveal only the commands `oracle` must sign that carry an attestable price.
pub fn oracle_view(stx: &SignedTransaction, oracle: &Party) -> Result<FilteredView, FlowError> {
    FilteredView::build(&stx.tx, |c| {
        c.signers.contains(&oracle.owning_key) && matches!(c.data, CommandData::GiveAway { .. })
    })
    .map_err(|e| FlowError::MalformedProposal(e.to_string()))
}

impl Node {
    /// Send the oracle a filtered view of `stx` and fold its signature in.
    pub async fn collect_oracle_signature(
        &self,
        cp: &mut Checkpoint,
        stx: SignedTransaction,
        oracle: &Party,
    ) -> Result<SignedTransaction, FlowError> {
        self.checkpoints.advance(cp, FlowStep::AwaitingOracle, Some(stx.id))?;
        let view = oracle_view(&stx, oracle)?;
        if view.commands.is_empty() {
            return Err(FlowError::MalformedProposal("no command for the oracle to attest".into()));
        }
        info!(tx_id = %stx.id, oracle = %oracle, revealed = view.commands.len(), "requesting attestation");

        let mut session = self.transport.open(&self.identity, oracle, Protocol::OracleAttestation).await?;
        let response: AttestResponse = session.send_and_receive(&AttestRequest { view: view.clone() }).await?;

        let sig = match response {
            AttestResponse::Rejected(e) => {
                self.metrics.oracle_rejections_total.inc();
                warn!(tx_id = %stx.id, oracle = %oracle, error = %e, "attestation refused");
                return Err(e.into());
            }
            AttestResponse::Signed(sig) => sig,
        };

        if sig.by != oracle.owning_key
            || sig.scope != (SignatureScope::FilteredView { positions: view.positions() })
        {
            return Err(FlowError::Signature("oracle signed something else".into()));
        }
        let msg = stx.signed_bytes(&sig.scope, &sig.by)?;
        verify_pubkey_bytes(&sig.by, &msg, &sig.signature)
            .map_err(|_| FlowError::Signature("invalid oracle signature".into()))?;
        Ok(stx.with_signature(sig))
    }
}
