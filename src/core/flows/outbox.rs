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

//! Finalised transactions still owed to some participants.
//!
//! Once a notary has certified a transaction it cannot be taken back, so a participant that
//! could not be reached is remembered here until it acknowledges. Entries are keyed by a
//! monotonic sequence and therefore iterate in commit order.

use crate::core::{
    ledger::{states::StateAndRef, transaction::SignedTransaction},
    state::persistent_state::{KvOp, PersistentState, StateError},
    types::{decode_canonical, encode_canonical},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A committed transaction and the participants that have not recorded it yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingBroadcast {
    /// Fully signed and notarised.
    pub stx: SignedTransaction,
    /// Resolved inputs, in input order.
    pub inputs: Vec<StateAndRef>,
    /// Party names still to deliver to.
    pub peers: Vec<String>,
}

/// Durable queue of owed deliveries.
#[derive(Clone)]
pub struct Outbox {
    store: PersistentState,
    tree: sled::Tree,
}

impl Outbox {
    /// Open the outbox tree in `store`.
    pub fn open(store: &PersistentState) -> Result<Self, StateError> {
        Ok(Self { store: store.clone(), tree: store.tree("flows/outbox")? })
    }

    /// Queue `entry` behind everything already owed. Returns its sequence number.
    pub fn push(&self, entry: &PendingBroadcast) -> Result<u64, StateError> {
        let seq = self.store.generate_id()?;
        self.update(seq, entry)?;
        debug!(seq, tx_id = %entry.stx.id, peers = ?entry.peers, "delivery owed");
        Ok(seq)
    }

    /// Rewrite entry `seq`; an entry with no peers left is removed.
    pub fn update(&self, seq: u64, entry: &PendingBroadcast) -> Result<(), StateError> {
        let key = seq.to_be_bytes().to_vec();
        let op = if entry.peers.is_empty() {
            KvOp::Del { key }
        } else {
            KvOp::Put { key, value: encode_canonical(entry)? }
        };
        PersistentState::commit_atomic(&self.tree, &[op])
    }

    /// Everything still owed, oldest first.
    pub fn pending(&self) -> Result<Vec<(u64, PendingBroadcast)>, StateError> {
        let mut out = Vec::new();
        for item in self.tree.iter() {
            let (key, raw) = item?;
            let seq = <[u8; 8]>::try_from(key.as_ref()).map(u64::from_be_bytes).map_err(|_| StateError::Codec)?;
            out.push((seq, decode_canonical(&raw)?));
        }
        Ok(out)
    }
}
