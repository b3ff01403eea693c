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

//! Finality: notarise, then have every participant record the transaction.
//!
//! The notary's certificate is the commit point. A participant that cannot be reached after it
//! is owed the transaction through the [`Outbox`](super::outbox::Outbox) and is retried, oldest
//! entry first, until it acknowledges. Each peer sees committed transactions in commit order.

use super::{
    checkpoint::{Checkpoint, FlowStep},
    outbox::PendingBroadcast,
    wire::{FinalityAck, FinalityRequest},
    FlowError, Node,
};
use crate::core::{
    ledger::{states::StateAndRef, transaction::SignedTransaction},
    notary::service::{NotarisationRequest, NotaryError},
    types::Party,
};
use crate::networking::transport::Protocol;
use futures::future::join_all;
use std::{collections::BTreeSet, sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info, warn};

impl Node {
    /// Notarise a fully signed transaction and broadcast it to all participants. On a
    /// conflict the transaction is void and nothing is recorded anywhere. Once certified the
    /// transaction is returned even if some participants are unreachable; they are owed it.
    pub async fn finalise(
        &self,
        cp: &mut Checkpoint,
        stx: SignedTransaction,
        inputs: &[StateAndRef],
    ) -> Result<SignedTransaction, FlowError> {
        stx.verify_required_signatures()?;

        self.checkpoints.advance(cp, FlowStep::Notarising, Some(stx.id))?;
        let request = NotarisationRequest {
            tx_id: stx.id,
            inputs: stx.tx.inputs.clone(),
            notary: stx.tx.notary.clone(),
        };
        let cert = match self.notaries.notarise(request).await {
            Ok(cert) => cert,
            Err(NotaryError::Conflict(conflicts)) => {
                self.metrics.double_spends_total.inc();
                warn!(tx_id = %stx.id, notary = %stx.tx.notary, conflicts = conflicts.len(), "double spend");
                return Err(FlowError::DoubleSpend(conflicts));
            }
            Err(e) => return Err(e.into()),
        };
        if cert.tx_id != stx.id || cert.notary != stx.tx.notary || !cert.verify() {
            return Err(FlowError::Signature("bad uniqueness certificate".into()));
        }
        self.metrics.notarisations_total.inc();
        let stx = stx.with_signature(cert.to_signature());

        self.checkpoints.advance_to_broadcast(cp, &stx, inputs)?;
        let recorded = self.vault.record_transaction(&stx, &self.identity)?;
        self.metrics.states_recorded_total.inc_by(recorded.len() as u64);

        let peers = self.peers_of(&stx, inputs);
        info!(tx_id = %stx.id, participants = peers.len(), "broadcasting finalised transaction");
        let owed = self.broadcast(&stx, inputs, peers).await?;
        if !owed.is_empty() {
            warn!(tx_id = %stx.id, owed = ?owed, "transaction committed; delivery deferred");
        }
        Ok(stx)
    }

    /// Retry every owed delivery once, oldest first. Returns how many peers acknowledged.
    pub async fn resume_broadcasts(&self) -> Result<usize, FlowError> {
        let _turn = self.delivery.lock().await;
        let (delivered, blocked) = self.redeliver().await?;
        if delivered > 0 || !blocked.is_empty() {
            info!(party = %self.identity, delivered, unreachable = blocked.len(), "redelivery pass");
        }
        Ok(delivered)
    }

    /// Retry owed deliveries every `every` until aborted.
    pub fn spawn_redelivery(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if let Err(e) = node.resume_broadcasts().await {
                    warn!(party = %node.identity, error = %e, "redelivery failed");
                }
            }
        })
    }

    /// Sort out runs a previous process left behind. A run that reached `Broadcasting` is
    /// recorded locally and its participants are owed the transaction; the others are reported.
    pub fn recover_interrupted(&self) -> Result<usize, FlowError> {
        let mut resumed = 0;
        for cp in self.checkpoints.interrupted()? {
            match (cp.step, &cp.notarised) {
                (FlowStep::Broadcasting, Some(n)) => {
                    let recorded = self.vault.record_transaction(&n.stx, &self.identity)?;
                    self.metrics.states_recorded_total.inc_by(recorded.len() as u64);
                    let peers = self.peers_of(&n.stx, &n.inputs);
                    if !peers.is_empty() {
                        self.outbox.push(&PendingBroadcast {
                            stx: n.stx.clone(),
                            inputs: n.inputs.clone(),
                            peers,
                        })?;
                    }
                    self.checkpoints.finish(&cp)?;
                    info!(party = %self.identity, run = cp.run_id, flow = %cp.flow, tx_id = %n.stx.id, "resuming delivery of notarised transaction");
                    resumed += 1;
                }
                (FlowStep::Notarising | FlowStep::Broadcasting, _) => {
                    warn!(party = %self.identity, run = cp.run_id, flow = %cp.flow, tx_id = ?cp.tx_id, "interrupted at the notary; inputs may already be consumed");
                }
                (step, _) => {
                    warn!(party = %self.identity, run = cp.run_id, flow = %cp.flow, ?step, "interrupted run; safe to retry");
                }
            }
        }
        Ok(resumed)
    }

    fn peers_of(&self, stx: &SignedTransaction, inputs: &[StateAndRef]) -> Vec<String> {
        stx.participants(inputs)
            .into_iter()
            .filter(|p| *p != self.identity)
            .map(|p| p.name)
            .collect()
    }

    /// Deliver `stx` behind anything already owed. Returns the peers it is now owed to.
    async fn broadcast(
        &self,
        stx: &SignedTransaction,
        inputs: &[StateAndRef],
        peers: Vec<String>,
    ) -> Result<Vec<String>, FlowError> {
        let _turn = self.delivery.lock().await;
        let (_, blocked) = self.redeliver().await?;
        let (mut owed, ready): (Vec<String>, Vec<String>) =
            peers.into_iter().partition(|p| blocked.contains(p));

        let outcomes = join_all(ready.iter().map(|p| self.deliver(p, stx, inputs))).await;
        owed.extend(ready.into_iter().zip(outcomes).filter(|(_, settled)| !settled).map(|(p, _)| p));

        if !owed.is_empty() {
            self.outbox.push(&PendingBroadcast { stx: stx.clone(), inputs: inputs.to_vec(), peers: owed.clone() })?;
        }
        Ok(owed)
    }

    /// One pass over the outbox. A peer that fails is skipped for the rest of the pass so it
    /// never receives a later transaction before an earlier one.
    async fn redeliver(&self) -> Result<(usize, BTreeSet<String>), FlowError> {
        let mut delivered = 0;
        let mut blocked = BTreeSet::new();
        for (seq, mut entry) in self.outbox.pending()? {
            let mut owed = Vec::new();
            for peer in entry.peers.iter() {
                if !blocked.contains(peer) && self.deliver(peer, &entry.stx, &entry.inputs).await {
                    delivered += 1;
                    continue;
                }
                blocked.insert(peer.clone());
                owed.push(peer.clone());
            }
            entry.peers = owed;
            self.outbox.update(seq, &entry)?;
        }
        Ok((delivered, blocked))
    }

    /// `true` once `peer` no longer needs the transaction: it recorded it, or refused it.
    async fn deliver(&self, peer: &str, stx: &SignedTransaction, inputs: &[StateAndRef]) -> bool {
        let party = match self.network_map.party(peer) {
            Ok(p) => p,
            Err(e) => {
                error!(tx_id = %stx.id, peer, error = %e, "dropping delivery to unknown party");
                return true;
            }
        };
        match self.send_final(&party, stx, inputs).await {
            Ok(()) => true,
            Err(e @ FlowError::RejectedByCounterparty { .. }) => {
                error!(tx_id = %stx.id, peer, error = %e, "participant refused a notarised transaction");
                true
            }
            Err(e) => {
                warn!(tx_id = %stx.id, peer, error = %e, "delivery failed; will retry");
                false
            }
        }
    }

    async fn send_final(
        &self,
        party: &Party,
        stx: &SignedTransaction,
        inputs: &[StateAndRef],
    ) -> Result<(), FlowError> {
        let mut session = self.transport.open(&self.identity, party, Protocol::Finality).await?;
        let request = FinalityRequest { stx: stx.clone(), inputs: inputs.to_vec() };
        match session.send_and_receive(&request).await? {
            FinalityAck::Recorded(n) => {
                info!(tx_id = %stx.id, peer = %party, states = n, "participant recorded transaction");
                Ok(())
            }
            FinalityAck::Rejected(reason) => {
                Err(FlowError::RejectedByCounterparty { party: party.name.clone(), reason })
            }
        }
    }
}
