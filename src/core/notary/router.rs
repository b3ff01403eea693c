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

//! Notary selection policies.
//!
//! - default: first registered notary
//! - deterministic: `Notary-<H(type) mod count>` for message types
//! - majority: the notary governing most of a set of inputs; ties go to the
//!   lexicographically smallest notary name

use crate::core::{
    ledger::states::StateAndRef,
    types::{Party, H256},
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Name prefix of routable notaries.
pub const NOTARY_NAME_PREFIX: &str = "Notary-";

/// Routing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// No notary carries the requested name.
    #[error("no notary registered as {0}")]
    NoMatchingNotary(String),
    /// The network has no notaries at all.
    #[error("no notary found")]
    NoNotaryFound,
}

/// Stable index of a message type among `count` notaries: first 8 bytes of SHA-256(type),
/// big endian, modulo `count`.
pub fn type_index(kind: &str, count: usize) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let h = H256::digest(kind.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&h.as_bytes()[..8]);
    Some((u64::from_be_bytes(head) % count as u64) as usize)
}

/// Selects exactly one notary for a proposal.
#[derive(Clone, Debug, Default)]
pub struct NotaryRouter {
    notaries: Vec<Party>,
}

impl NotaryRouter {
    /// Router over notaries in registration order.
    pub fn new(notaries: Vec<Party>) -> Self {
        Self { notaries }
    }

    /// Registered notaries in registration order.
    pub fn notaries(&self) -> &[Party] {
        &self.notaries
    }

    /// Notary registered under `name`.
    pub fn find(&self, name: &str) -> Option<&Party> {
        self.notaries.iter().find(|n| n.name == name)
    }

    /// First registered notary.
    pub fn default_notary(&self) -> Result<&Party, RoutingError> {
        self.notaries.first().ok_or(RoutingError::NoNotaryFound)
    }

    /// Deterministic routing on a message type.
    pub fn route_by_type(&self, kind: &str) -> Result<&Party, RoutingError> {
        let index = type_index(kind, self.notaries.len()).ok_or(RoutingError::NoNotaryFound)?;
        let name = format!("{NOTARY_NAME_PREFIX}{index}");
        debug!(kind, index, notary = %name, "routing by message type");
        self.find(&name).ok_or(RoutingError::NoMatchingNotary(name))
    }

    /// Majority consolidation over the inputs' current notaries.
    pub fn majority(&self, inputs: &[StateAndRef]) -> Result<Party, RoutingError> {
        let mut tally: BTreeMap<&str, (usize, &Party)> = BTreeMap::new();
        for input in inputs.iter() {
            let notary = &input.state.notary;
            tally.entry(notary.name.as_str()).or_insert((0, notary)).0 += 1;
        }
        // BTreeMap iterates names in ascending order; only a strictly larger count replaces.
        let mut best: Option<(usize, &Party)> = None;
        for (count, party) in tally.into_values() {
            if best.map_or(true, |(c, _)| count > c) {
                best = Some((count, party));
            }
        }
        best.map(|(_, p)| p.clone()).ok_or(RoutingError::NoNotaryFound)
    }
}
