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

//! Durable step cursor for workflow runs.
//!
//! A run writes its checkpoint when it starts and overwrites it at every suspension point.
//! The checkpoint is removed when the run commits or aborts, so anything left in the tree
//! after a restart is an interrupted run. A run stopped before `Notarising` left nothing behind
//! and can be retried from scratch. From `Broadcasting` on the checkpoint carries the notarised
//! transaction, so delivery to the participants can be finished after a restart.

use crate::core::{
    ledger::{states::StateAndRef, transaction::SignedTransaction},
    state::persistent_state::{KvOp, PersistentState, StateError},
    types::{decode_canonical, encode_canonical, H256},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Suspension points of a workflow run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStep {
    /// Assembling and verifying the proposal.
    Building,
    /// Waiting for counterparty signatures.
    CollectingSignatures,
    /// Waiting for the oracle.
    AwaitingOracle,
    /// Waiting for the notary.
    Notarising,
    /// Waiting for participants to record the transaction.
    Broadcasting,
}

/// A transaction the notary has certified, with the states it consumed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotarisedTx {
    /// Fully signed and notarised.
    pub stx: SignedTransaction,
    /// Resolved inputs, in input order.
    pub inputs: Vec<StateAndRef>,
}

/// Persisted context of one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Run id, unique per node.
    pub run_id: u64,
    /// Workflow name.
    pub flow: String,
    /// Current step.
    pub step: FlowStep,
    /// Transaction being coordinated, once built.
    pub tx_id: Option<H256>,
    /// Set when the run enters `Broadcasting`.
    pub notarised: Option<NotarisedTx>,
}

/// Checkpoint tree.
#[derive(Clone)]
pub struct CheckpointStore {
    store: PersistentState,
    tree: sled::Tree,
}

impl CheckpointStore {
    /// Open the checkpoint tree in `store`.
    pub fn open(store: &PersistentState) -> Result<Self, StateError> {
        Ok(Self { store: store.clone(), tree: store.tree("flows/checkpoints")? })
    }

    fn put(&self, cp: &Checkpoint) -> Result<(), StateError> {
        let value = encode_canonical(cp)?;
        PersistentState::commit_atomic(
            &self.tree,
            &[KvOp::Put { key: cp.run_id.to_be_bytes().to_vec(), value }],
        )
    }

    /// Start a run of `flow`.
    pub fn begin(&self, flow: &str) -> Result<Checkpoint, StateError> {
        let cp = Checkpoint {
            run_id: self.store.generate_id()?,
            flow: flow.to_string(),
            step: FlowStep::Building,
            tx_id: None,
            notarised: None,
        };
        self.put(&cp)?;
        debug!(run = cp.run_id, flow, "run started");
        Ok(cp)
    }

    /// Move `cp` to `step`.
    pub fn advance(&self, cp: &mut Checkpoint, step: FlowStep, tx_id: Option<H256>) -> Result<(), StateError> {
        cp.step = step;
        if tx_id.is_some() {
            cp.tx_id = tx_id;
        }
        self.put(cp)?;
        debug!(run = cp.run_id, flow = %cp.flow, ?step, "run advanced");
        Ok(())
    }

    /// Enter `Broadcasting` with the certified transaction. Written before anything is
    /// recorded or sent.
    pub fn advance_to_broadcast(
        &self,
        cp: &mut Checkpoint,
        stx: &SignedTransaction,
        inputs: &[StateAndRef],
    ) -> Result<(), StateError> {
        cp.step = FlowStep::Broadcasting;
        cp.tx_id = Some(stx.id);
        cp.notarised = Some(NotarisedTx { stx: stx.clone(), inputs: inputs.to_vec() });
        self.put(cp)?;
        debug!(run = cp.run_id, flow = %cp.flow, tx_id = %stx.id, "run notarised");
        Ok(())
    }

    /// Remove a finished run.
    pub fn finish(&self, cp: &Checkpoint) -> Result<(), StateError> {
        PersistentState::commit_atomic(&self.tree, &[KvOp::Del { key: cp.run_id.to_be_bytes().to_vec() }])
    }

    /// Runs that never finished, oldest first.
    pub fn interrupted(&self) -> Result<Vec<Checkpoint>, StateError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (_, raw) = item?;
            out.push(decode_canonical(&raw)?);
        }
        Ok(out)
    }

    /// Drop every leftover checkpoint.
    pub fn clear(&self) -> Result<usize, StateError> {
        let stale = self.interrupted()?;
        let ops: Vec<KvOp> =
            stale.iter().map(|cp| KvOp::Del { key: cp.run_id.to_be_bytes().to_vec() }).collect();
        PersistentState::commit_atomic(&self.tree, &ops)?;
        Ok(stale.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        ledger::transaction::{Command, CommandData, Proposal},
        types::{Party, PublicKey},
    };
    use std::collections::BTreeSet;

    fn unsigned_send() -> SignedTransaction {
        let proposal = Proposal {
            inputs: Vec::new(),
            outputs: Vec::new(),
            commands: vec![Command { data: CommandData::Send, signers: BTreeSet::from([PublicKey([1; 32])]) }],
            notary: Party::new("Notary-0", PublicKey([7; 32])),
            privacy_salt: [3; 32],
        };
        SignedTransaction::new(proposal, Vec::new()).unwrap()
    }

    #[test]
    fn unfinished_runs_are_listed() {
        let store = PersistentState::temporary().unwrap();
        let cps = CheckpointStore::open(&store).unwrap();

        let mut a = cps.begin("SendMessage").unwrap();
        let b = cps.begin("GiveAwayStock").unwrap();
        cps.advance(&mut a, FlowStep::Notarising, Some(H256::digest(b"tx"))).unwrap();
        cps.finish(&b).unwrap();

        let left = cps.interrupted().unwrap();
        assert_eq!(left, vec![a]);
        assert_eq!(cps.clear().unwrap(), 1);
        assert!(cps.interrupted().unwrap().is_empty());
    }

    #[test]
    fn broadcasting_runs_keep_their_transaction() {
        let store = PersistentState::temporary().unwrap();
        let cps = CheckpointStore::open(&store).unwrap();
        let stx = unsigned_send();

        let mut cp = cps.begin("SendMessage").unwrap();
        assert!(cp.notarised.is_none());
        cps.advance_to_broadcast(&mut cp, &stx, &[]).unwrap();

        let reopened = CheckpointStore::open(&store).unwrap();
        let left = reopened.interrupted().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].step, FlowStep::Broadcasting);
        assert_eq!(left[0].tx_id, Some(stx.id));
        let kept = left[0].notarised.as_ref().unwrap();
        assert_eq!(kept.stx, stx);
        assert!(kept.inputs.is_empty());
    }
}
