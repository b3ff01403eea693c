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

//! Initiator side of signature collection.
//!
//! One session per counterparty, all running concurrently. Each session goes
//! `Requested -> Signed | Rejected`; the collection is `Complete` once every session has
//! signed. A single rejection (or an unreachable counterparty) fails the whole collection.

use super::{
    checkpoint::{Checkpoint, FlowStep},
    wire::{SignRequest, SignResponse},
    FlowError, Node,
};
use crate::core::{
    ledger::{
        signing::tx_signing_bytes,
        states::StateAndRef,
        transaction::{SignatureScope, SignedTransaction, TransactionSignature},
    },
    security::keystore::verify_pubkey_bytes,
    types::{Party, PublicKey},
};
use crate::networking::transport::Protocol;
use futures::future::try_join_all;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Progress of signature collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningState {
    /// Proposal sent, waiting.
    Requested,
    /// Counterparty signed.
    Signed,
    /// Counterparty refused.
    Rejected,
    /// Every counterparty signed.
    Complete,
}

impl Node {
    /// Parties that must still sign: every required signer except us and `pending`.
    pub(crate) fn counterparties(
        &self,
        stx: &SignedTransaction,
        pending: &BTreeSet<PublicKey>,
    ) -> Result<Vec<Party>, FlowError> {
        stx.tx
            .required_signers()
            .into_iter()
            .filter(|k| *k != self.identity.owning_key && !pending.contains(k))
            .map(|k| {
                self.network_map
                    .by_key(&k)
                    .cloned()
                    .ok_or_else(|| FlowError::UnknownParty(k.to_string()))
            })
            .collect()
    }

    /// Collect signatures from every required signer except us and `pending` (keys that sign
    /// later, such as the oracle's).
    pub async fn collect_signatures(
        &self,
        cp: &mut Checkpoint,
        stx: SignedTransaction,
        inputs: &[StateAndRef],
        pending: &BTreeSet<PublicKey>,
    ) -> Result<SignedTransaction, FlowError> {
        self.checkpoints.advance(cp, FlowStep::CollectingSignatures, Some(stx.id))?;
        let parties = self.counterparties(&stx, pending)?;
        info!(party = %self.identity, tx_id = %stx.id, counterparties = parties.len(), "collecting signatures");

        let sessions = parties.iter().map(|p| self.request_signature(p, &stx, inputs));
        let sigs = try_join_all(sessions).await?;

        let mut stx = stx;
        for sig in sigs {
            stx = stx.with_signature(sig);
        }
        stx.verify_signatures_except(pending)?;
        debug!(tx_id = %stx.id, state = ?SigningState::Complete, "signatures collected");
        Ok(stx)
    }

    async fn request_signature(
        &self,
        party: &Party,
        stx: &SignedTransaction,
        inputs: &[StateAndRef],
    ) -> Result<TransactionSignature, FlowError> {
        let mut session = self.transport.open(&self.identity, party, Protocol::SignTransaction).await?;
        debug!(tx_id = %stx.id, peer = %party, state = ?SigningState::Requested, "signature requested");
        let request = SignRequest { stx: stx.clone(), inputs: inputs.to_vec() };
        let response: SignResponse = session.send_and_receive(&request).await?;

        match response {
            SignResponse::Rejected(reason) => {
                warn!(tx_id = %stx.id, peer = %party, state = ?SigningState::Rejected, %reason, "signature refused");
                Err(FlowError::RejectedByCounterparty { party: party.name.clone(), reason })
            }
            SignResponse::Signed(sig) => {
                if sig.by != party.owning_key || sig.scope != SignatureScope::Transaction {
                    return Err(FlowError::Signature(format!("{party} signed with the wrong key or scope")));
                }
                verify_pubkey_bytes(&sig.by, &tx_signing_bytes(&stx.id), &sig.signature)
                    .map_err(|_| FlowError::Signature(format!("invalid signature from {party}")))?;
                self.metrics.signatures_collected_total.inc();
                debug!(tx_id = %stx.id, peer = %party, state = ?SigningState::Signed, "signature received");
                Ok(sig)
            }
        }
    }
}
