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

//! Filtered views: redacted projections of a transaction for limited-trust parties.
//!
//! A view carries the transaction id and, for each revealed command, its nonce and a Merkle
//! inclusion proof. Nothing else about the transaction is transmitted. The signable identity
//!
//! view_id = H( "Ledgerflow-Filtered-View-v1" || tx_id || (position || leaf)* )
//!
//! binds to the full transaction through `tx_id`, so replacing any component after a view was
//! signed invalidates that signature.

use crate::core::{
    ledger::{
        merkle::{merkle_proof, merkle_root, verify_proof, MerkleProof},
        transaction::{component_leaf, Command, ComponentGroup, Proposal},
    },
    types::{encode_canonical, CodecError, H256},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const VIEW_DOMAIN: &[u8] = b"Ledgerflow-Filtered-View-v1";

/// Filtered view errors.
#[derive(Debug, Error)]
pub enum FilteredViewError {
    /// Only command components may be revealed.
    #[error("position {0} is not a revealable command")]
    NotACommand(u32),
    /// A revealed component does not match its leaf.
    #[error("revealed component does not hash to its proof leaf")]
    LeafMismatch,
    /// A proof does not lead to the transaction id.
    #[error("inclusion proof does not reach the transaction id")]
    BadProof,
    /// Positions must be strictly increasing.
    #[error("revealed positions are not strictly increasing")]
    Ordering,
    /// A component could not be encoded.
    #[error("codec")]
    Codec(#[from] CodecError),
}

/// A revealed command with what is needed to check it against the transaction id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevealedCommand {
    /// Index within the command group.
    pub index: u32,
    /// Component nonce.
    pub nonce: H256,
    /// The command itself.
    pub command: Command,
    /// Inclusion proof of the command leaf.
    pub proof: MerkleProof,
}

impl RevealedCommand {
    /// Merkle leaf position.
    pub fn position(&self) -> u32 {
        self.proof.position() as u32
    }
}

/// Redacted projection of a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilteredView {
    /// Id of the full transaction.
    pub tx_id: H256,
    /// Revealed commands in leaf order.
    pub commands: Vec<RevealedCommand>,
}

impl FilteredView {
    /// Reveal exactly the commands selected by `predicate`.
    pub fn build<F>(tx: &Proposal, predicate: F) -> Result<Self, FilteredViewError>
    where
        F: Fn(&Command) -> bool,
    {
        let leaves = tx.leaves()?;
        let hashes: Vec<H256> = leaves.iter().map(|l| l.leaf).collect();
        let mut commands = Vec::new();
        for (pos, l) in leaves.iter().enumerate() {
            if l.group != ComponentGroup::Commands {
                continue;
            }
            let Some(cmd) = tx.commands.get(l.index as usize) else { continue; };
            if !predicate(cmd) {
                continue;
            }
            let proof = merkle_proof(&hashes, pos).ok_or(FilteredViewError::BadProof)?;
            commands.push(RevealedCommand { index: l.index, nonce: l.nonce, command: cmd.clone(), proof });
        }
        Ok(Self { tx_id: merkle_root(&hashes), commands })
    }

    /// Rebuild the view that reveals exactly `positions`.
    pub fn for_positions(tx: &Proposal, positions: &[u32]) -> Result<Self, FilteredViewError> {
        let leaves = tx.leaves()?;
        for p in positions {
            match leaves.get(*p as usize) {
                Some(l) if l.group == ComponentGroup::Commands => {}
                _ => return Err(FilteredViewError::NotACommand(*p)),
            }
        }
        let hashes: Vec<H256> = leaves.iter().map(|l| l.leaf).collect();
        let mut commands = Vec::with_capacity(positions.len());
        for p in positions {
            let l = &leaves[*p as usize];
            let command = tx
                .commands
                .get(l.index as usize)
                .cloned()
                .ok_or(FilteredViewError::NotACommand(*p))?;
            let proof = merkle_proof(&hashes, *p as usize).ok_or(FilteredViewError::BadProof)?;
            commands.push(RevealedCommand { index: l.index, nonce: l.nonce, command, proof });
        }
        let view = Self { tx_id: merkle_root(&hashes), commands };
        view.check_ordering()?;
        Ok(view)
    }

    /// Revealed leaf positions.
    pub fn positions(&self) -> Vec<u32> {
        self.commands.iter().map(RevealedCommand::position).collect()
    }

    /// Signable identity of this view.
    pub fn view_id(&self) -> H256 {
        let mut buf = Vec::with_capacity(VIEW_DOMAIN.len() + 32 + self.commands.len() * 36);
        buf.extend_from_slice(VIEW_DOMAIN);
        buf.extend_from_slice(self.tx_id.as_bytes());
        for c in self.commands.iter() {
            buf.extend_from_slice(&c.position().to_be_bytes());
            buf.extend_from_slice(c.proof.leaf.as_bytes());
        }
        H256::digest(&buf)
    }

    fn check_ordering(&self) -> Result<(), FilteredViewError> {
        let positions = self.positions();
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FilteredViewError::Ordering);
        }
        Ok(())
    }

    /// Check every revealed command against the transaction id.
    pub fn verify(&self) -> Result<(), FilteredViewError> {
        self.check_ordering()?;
        for c in self.commands.iter() {
            let bytes = encode_canonical(&c.command)?;
            if component_leaf(ComponentGroup::Commands, &c.nonce, &bytes) != c.proof.leaf {
                return Err(FilteredViewError::LeafMismatch);
            }
            if !verify_proof(self.tx_id, &c.proof) {
                return Err(FilteredViewError::BadProof);
            }
        }
        Ok(())
    }
}
