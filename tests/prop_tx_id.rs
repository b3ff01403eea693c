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

use proptest::prelude::*;
use std::collections::BTreeSet;

use ledgerflow::core::ledger::filtered::FilteredView;
use ledgerflow::core::ledger::merkle::{merkle_proof, merkle_root, verify_proof};
use ledgerflow::core::ledger::transaction::{Command, CommandData, Proposal};
use ledgerflow::core::types::{Party, PublicKey, StateRef, H256};

fn proposal(inputs: &[(u8, u32)], commands: &[(u8, u8)], salt: [u8; 32]) -> Proposal {
    Proposal {
        inputs: inputs
            .iter()
            .map(|(seed, index)| StateRef { tx_id: H256::digest(&[*seed]), index: *index })
            .collect(),
        outputs: Vec::new(),
        commands: commands
            .iter()
            .map(|(kind, signer)| Command {
                data: if kind % 2 == 0 { CommandData::Reply } else { CommandData::Send },
                signers: BTreeSet::from([PublicKey([*signer; 32])]),
            })
            .collect(),
        notary: Party::new("Notary-0", PublicKey([0xAA; 32])),
        privacy_salt: salt,
    }
}

proptest! {
    #[test]
    fn merkle_proof_verifies_for_any_nonempty_set(
        leaves in proptest::collection::vec(any::<[u8; 32]>(), 1..64),
        pick in any::<prop::sample::Index>(),
    ) {
        let leaves: Vec<H256> = leaves.into_iter().map(H256::from_bytes).collect();
        let root = merkle_root(&leaves);
        let idx = pick.index(leaves.len());

        let proof = merkle_proof(&leaves, idx).expect("proof exists for every index");
        prop_assert!(verify_proof(root, &proof));
        prop_assert_eq!(proof.position(), idx as u64);
    }

    #[test]
    fn every_command_subset_yields_a_verifiable_view(
        inputs in proptest::collection::vec((any::<u8>(), 0u32..4), 0..6),
        commands in proptest::collection::vec((any::<u8>(), any::<u8>()), 1..6),
        salt in any::<[u8; 32]>(),
        mask in any::<u8>(),
    ) {
        let tx = proposal(&inputs, &commands, salt);
        let keep: BTreeSet<PublicKey> = commands
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, (_, signer))| PublicKey([*signer; 32]))
            .collect();

        let view = FilteredView::build(&tx, |c| c.signers.iter().any(|k| keep.contains(k))).unwrap();
        prop_assert_eq!(view.tx_id, tx.id().unwrap());
        prop_assert!(view.verify().is_ok());
        prop_assert_eq!(FilteredView::for_positions(&tx, &view.positions()).unwrap(), view);
    }

    #[test]
    fn id_commits_to_inputs_and_salt(
        inputs in proptest::collection::vec((any::<u8>(), 0u32..4), 1..6),
        salt in any::<[u8; 32]>(),
        other_salt in any::<[u8; 32]>(),
    ) {
        prop_assume!(salt != other_salt);
        let commands = [(0u8, 1u8)];
        let tx = proposal(&inputs, &commands, salt);
        prop_assert_eq!(tx.id().unwrap(), proposal(&inputs, &commands, salt).id().unwrap());
        prop_assert_ne!(tx.id().unwrap(), proposal(&inputs, &commands, other_salt).id().unwrap());

        let mut moved = inputs.clone();
        moved[0].1 += 4;
        prop_assert_ne!(tx.id().unwrap(), proposal(&moved, &commands, salt).id().unwrap());
    }
}
