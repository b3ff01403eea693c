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

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use ledgerflow::core::ledger::merkle::{merkle_proof, merkle_root, verify_proof};
use ledgerflow::core::types::H256;
use libfuzzer_sys::fuzz_target;

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    leaves: Vec<[u8; 32]>,
    index: u16,
    flip: Option<u8>,
}

fuzz_target!(|inp: Input| {
    let leaves: Vec<H256> = inp.leaves.into_iter().map(H256::from_bytes).collect();
    let root = merkle_root(&leaves);
    if leaves.is_empty() {
        return;
    }
    let idx = (inp.index as usize) % leaves.len();
    let Some(mut proof) = merkle_proof(&leaves, idx) else { return; };
    assert!(verify_proof(root, &proof));
    assert_eq!(proof.position(), idx as u64);

    if let Some(bit) = inp.flip {
        let mut bytes = *proof.leaf.as_bytes();
        bytes[(bit as usize / 8) % 32] ^= 1 << (bit % 8);
        proof.leaf = H256::from_bytes(bytes);
        assert!(!verify_proof(root, &proof));
    }
});
