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

//! Deterministic Merkle tree over ordered transaction components.
//!
//! node = H( "Ledgerflow-Tx-Node-v1" || left || right )
//!
//! Leaves are supplied already hashed (see `transaction::component_leaf`). An odd node at
//! any level is paired with itself.

use crate::core::types::H256;
use serde::{Deserialize, Serialize};

const NODE_DOMAIN: &[u8] = b"Ledgerflow-Tx-Node-v1";

/// Side of sibling in proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Sibling is left.
    Left,
    /// Sibling is right.
    Right,
}

/// One proof item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofItem {
    /// Whether sibling is left or right of current hash.
    pub side: Side,
    /// Sibling hash.
    pub sibling: H256,
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf hash.
    pub leaf: H256,
    /// Path items from leaf to root.
    pub path: Vec<ProofItem>,
}

impl MerkleProof {
    /// Leaf position implied by the path.
    pub fn position(&self) -> u64 {
        self.path.iter().enumerate().fold(0u64, |acc, (depth, item)| match item.side {
            Side::Left => acc | 1u64.checked_shl(depth as u32).unwrap_or(0),
            Side::Right => acc,
        })
    }
}

fn hash_node(left: H256, right: H256) -> H256 {
    let mut buf = Vec::with_capacity(NODE_DOMAIN.len() + 32 + 32);
    buf.extend_from_slice(NODE_DOMAIN);
    buf.extend_from_slice(left.as_bytes());
    buf.extend_from_slice(right.as_bytes());
    H256::digest(&buf)
}

fn next_level(level: &[H256]) -> Vec<H256> {
    level
        .chunks(2)
        .map(|pair| hash_node(pair[0], pair.get(1).copied().unwrap_or(pair[0])))
        .collect()
}

/// Merkle root over ordered leaves. Empty input yields [`H256::ZERO`].
pub fn merkle_root(leaves: &[H256]) -> H256 {
    if leaves.is_empty() {
        return H256::ZERO;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Inclusion proof for the leaf at `index`.
pub fn merkle_proof(leaves: &[H256], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }

    let mut level = leaves.to_vec();
    let mut idx = index;
    let leaf = level[idx];
    let mut path = Vec::new();

    while level.len() > 1 {
        let is_right = idx % 2 == 1;
        let sib_idx = if is_right { idx - 1 } else { idx + 1 };
        let sibling = level.get(sib_idx).copied().unwrap_or(level[idx]);
        path.push(ProofItem {
            side: if is_right { Side::Left } else { Side::Right },
            sibling,
        });
        level = next_level(&level);
        idx /= 2;
    }

    Some(MerkleProof { leaf, path })
}

/// Verify proof against root.
pub fn verify_proof(root: H256, proof: &MerkleProof) -> bool {
    let mut cur = proof.leaf;
    for item in proof.path.iter() {
        cur = match item.side {
            Side::Left => hash_node(item.sibling, cur),
            Side::Right => hash_node(cur, item.sibling),
        };
    }
    cur == root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<H256> {
        (0..n).map(|i| H256::digest(&(i as u64).to_be_bytes())).collect()
    }

    #[test]
    fn every_leaf_proves_at_its_position() {
        for n in 1..12 {
            let ls = leaves(n);
            let root = merkle_root(&ls);
            for i in 0..n {
                let p = merkle_proof(&ls, i).unwrap();
                assert!(verify_proof(root, &p));
                assert_eq!(p.position(), i as u64);
            }
        }
    }

    #[test]
    fn tampered_leaf_fails() {
        let ls = leaves(5);
        let root = merkle_root(&ls);
        let mut p = merkle_proof(&ls, 3).unwrap();
        p.leaf = H256::digest(b"other");
        assert!(!verify_proof(root, &p));
    }
}
