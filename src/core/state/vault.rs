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

//! Vault: durable, append-only record of committed states and transactions.
//!
//! Trees:
//! - `vault/states`    seq -> VaultRecord (seq gives insertion order)
//! - `vault/refs`      StateRef -> seq
//! - `vault/by_sender` sender name || 0x00 || seq -> () (message index)
//! - `vault/txs`       tx id -> SignedTransaction
//!
//! Recording a transaction writes all four trees in one sled transaction: a participant either
//! has every relevant output and every consumption mark, or none of them.

use crate::core::{
    ledger::{
        states::{ContractState, StateAndRef},
        transaction::SignedTransaction,
    },
    state::persistent_state::{map_tx_error, PersistentState, StateError},
    types::{decode_canonical, encode_canonical, Party, StateRef, H256},
};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use tracing::debug;

/// A state as held by the vault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VaultRecord {
    /// Insertion sequence.
    pub seq: u64,
    /// The state.
    pub state: StateAndRef,
    /// Consuming transaction, once spent.
    pub consumed_by: Option<H256>,
}

/// Which states a query returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StateStatus {
    /// Open (unspent) states only.
    #[default]
    Unconsumed,
    /// Spent states only.
    Consumed,
    /// Everything.
    All,
}

/// Sender predicate for message queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SenderFilter {
    /// Sent by this party.
    Is(String),
    /// Not sent by this party.
    IsNot(String),
}

/// Query predicate. Non-message states match only when no message filter is set.
#[derive(Clone, Debug, Default)]
pub struct QueryCriteria {
    /// Spent/unspent filter.
    pub status: StateStatus,
    /// Sender filter.
    pub sender: Option<SenderFilter>,
    /// Message type filter.
    pub kind: Option<String>,
}

impl QueryCriteria {
    fn matches(&self, rec: &VaultRecord) -> bool {
        let status_ok = match self.status {
            StateStatus::Unconsumed => rec.consumed_by.is_none(),
            StateStatus::Consumed => rec.consumed_by.is_some(),
            StateStatus::All => true,
        };
        if !status_ok {
            return false;
        }
        if self.sender.is_none() && self.kind.is_none() {
            return true;
        }
        let ContractState::Message(m) = &rec.state.state.data else {
            return false;
        };
        let sender_ok = match &self.sender {
            None => true,
            Some(SenderFilter::Is(name)) => &m.sender.name == name,
            Some(SenderFilter::IsNot(name)) => &m.sender.name != name,
        };
        sender_ok && self.kind.as_ref().map_or(true, |k| &m.kind == k)
    }
}

fn sender_key(sender: &str, seq: u64) -> Vec<u8> {
    let mut k = Vec::with_capacity(sender.len() + 1 + 8);
    k.extend_from_slice(sender.as_bytes());
    k.push(0);
    k.extend_from_slice(&seq.to_be_bytes());
    k
}

fn seq_from(bytes: &[u8]) -> Option<u64> {
    <[u8; 8]>::try_from(bytes).ok().map(u64::from_be_bytes)
}

/// Durable state store for one party.
#[derive(Clone)]
pub struct Vault {
    store: PersistentState,
    states: sled::Tree,
    refs: sled::Tree,
    by_sender: sled::Tree,
    txs: sled::Tree,
}

impl Vault {
    /// Open the vault trees in `store`.
    pub fn open(store: &PersistentState) -> Result<Self, StateError> {
        Ok(Self {
            store: store.clone(),
            states: store.tree("vault/states")?,
            refs: store.tree("vault/refs")?,
            by_sender: store.tree("vault/by_sender")?,
            txs: store.tree("vault/txs")?,
        })
    }

    /// Record a finalised transaction: mark known inputs consumed and insert the outputs in
    /// which `me` participates. Returns the newly recorded outputs. Recording the same
    /// transaction twice is a no-op.
    pub fn record_transaction(
        &self,
        stx: &SignedTransaction,
        me: &Party,
    ) -> Result<Vec<StateAndRef>, StateError> {
        let relevant: Vec<StateAndRef> = stx
            .output_refs()
            .into_iter()
            .filter(|s| s.state.data.participant_keys().contains(&me.owning_key))
            .collect();

        let mut new_records = Vec::with_capacity(relevant.len());
        for state in relevant.iter() {
            let seq = self.store.generate_id()?;
            new_records.push(VaultRecord { seq, state: state.clone(), consumed_by: None });
        }
        let tx_bytes = encode_canonical(stx)?;
        let encoded: Vec<(u64, Vec<u8>)> = new_records
            .iter()
            .map(|r| encode_canonical(r).map(|b| (r.seq, b)))
            .collect::<Result<_, _>>()?;

        let res: Result<bool, TransactionError<StateError>> =
            (&self.states, &self.refs, &self.by_sender, &self.txs).transaction(
                |(states, refs, by_sender, txs)| {
                    if txs.get(stx.id.as_bytes())?.is_some() {
                        return Ok(false);
                    }
                    txs.insert(&stx.id.as_bytes()[..], tx_bytes.as_slice())?;

                    for input in stx.tx.inputs.iter() {
                        let Some(seq_bytes) = refs.get(input.key_bytes())? else { continue; };
                        let Some(raw) = states.get(&seq_bytes)? else { continue; };
                        let mut rec: VaultRecord = decode_canonical(&raw)
                            .map_err(|_| ConflictableTransactionError::Abort(StateError::Codec))?;
                        rec.consumed_by = Some(stx.id);
                        let bytes = encode_canonical(&rec)
                            .map_err(|_| ConflictableTransactionError::Abort(StateError::Codec))?;
                        states.insert(seq_bytes.clone(), bytes)?;
                    }

                    for ((seq, bytes), rec) in encoded.iter().zip(new_records.iter()) {
                        let seq_bytes = seq.to_be_bytes();
                        states.insert(&seq_bytes[..], bytes.as_slice())?;
                        refs.insert(&rec.state.reference.key_bytes()[..], &seq_bytes[..])?;
                        if let ContractState::Message(m) = &rec.state.state.data {
                            by_sender.insert(sender_key(&m.sender.name, *seq), Vec::<u8>::new())?;
                        }
                    }
                    Ok(true)
                },
            );

        let fresh = res.map_err(map_tx_error)?;
        if !fresh {
            debug!(tx_id = %stx.id, "transaction already recorded");
            return Ok(Vec::new());
        }
        debug!(tx_id = %stx.id, party = %me, outputs = relevant.len(), "transaction recorded");
        Ok(relevant)
    }

    /// Look up a state by reference.
    pub fn get(&self, reference: &StateRef) -> Result<Option<VaultRecord>, StateError> {
        let Some(seq) = PersistentState::get(&self.refs, &reference.key_bytes())? else {
            return Ok(None);
        };
        self.load(&seq)
    }

    fn load(&self, seq_bytes: &[u8]) -> Result<Option<VaultRecord>, StateError> {
        match PersistentState::get(&self.states, seq_bytes)? {
            None => Ok(None),
            Some(raw) => Ok(Some(decode_canonical(&raw)?)),
        }
    }

    /// Recorded transaction by id.
    pub fn transaction(&self, id: &H256) -> Result<Option<SignedTransaction>, StateError> {
        match PersistentState::get(&self.txs, id.as_bytes())? {
            None => Ok(None),
            Some(raw) => Ok(Some(decode_canonical(&raw)?)),
        }
    }

    /// States matching `criteria`, in insertion order.
    pub fn query(&self, criteria: &QueryCriteria) -> Result<Vec<StateAndRef>, StateError> {
        let mut out = Vec::new();
        if let Some(SenderFilter::Is(name)) = &criteria.sender {
            let mut prefix = name.as_bytes().to_vec();
            prefix.push(0);
            for item in self.by_sender.scan_prefix(&prefix) {
                let (k, _) = item?;
                let Some(seq) = seq_from(&k[prefix.len()..]) else { continue; };
                if let Some(rec) = self.load(&seq.to_be_bytes())? {
                    if criteria.matches(&rec) {
                        out.push(rec.state);
                    }
                }
            }
            return Ok(out);
        }
        for item in self.states.iter() {
            let (_, raw) = item?;
            let rec: VaultRecord = decode_canonical(&raw)?;
            if criteria.matches(&rec) {
                out.push(rec.state);
            }
        }
        Ok(out)
    }
}
