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

mod common;

use common::builder;
use ledgerflow::core::flows::checkpoint::FlowStep;
use ledgerflow::core::ledger::signing::tx_signing_bytes;
use ledgerflow::core::ledger::states::TransactionState;
use ledgerflow::core::ledger::transaction::{
    Command, CommandData, Proposal, SignatureScope, SignedTransaction, TransactionSignature,
};
use ledgerflow::core::notary::service::NotarisationRequest;
use ledgerflow::core::security::keystore::Keystore;
use std::collections::BTreeSet;

#[tokio::test]
async fn notarised_run_left_behind_is_delivered_after_recovery() {
    let dir = tempfile::tempdir().unwrap();
    let net = builder(&["PartyA", "PartyB"], 2, &[]).data_dir(dir.path()).start().unwrap();
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());
    let a_key = Keystore::open(&dir.path().join("PartyA").to_string_lossy()).unwrap();

    let original = a.send_message("PartyB", "move me", "POST").await.unwrap().output_refs().remove(0);
    let old = original.state.notary.clone();
    let new = net.network_map().notaries().iter().find(|n| **n != old).unwrap().clone();

    // A notary change that was certified just before the process stopped.
    let proposal = Proposal {
        inputs: vec![original.reference],
        outputs: vec![TransactionState { data: original.state.data.clone(), notary: new.clone() }],
        commands: vec![Command {
            data: CommandData::NotaryChange { new_notary: new.clone() },
            signers: BTreeSet::from([a.identity().owning_key]),
        }],
        notary: old.clone(),
        privacy_salt: [4; 32],
    };
    let unsigned = SignedTransaction::new(proposal, Vec::new()).unwrap();
    let signature = a_key.sign(&tx_signing_bytes(&unsigned.id)).unwrap();
    let signed = unsigned.with_signature(TransactionSignature {
        by: a_key.public_key(),
        signature,
        scope: SignatureScope::Transaction,
    });
    let cert = net
        .notary(&old.name)
        .unwrap()
        .notarise(&NotarisationRequest { tx_id: signed.id, inputs: signed.tx.inputs.clone(), notary: old.clone() })
        .unwrap();
    let stx = signed.with_signature(cert.to_signature());

    let mut left_at_broadcast = a.checkpoints().begin("ChangeNotary").unwrap();
    a.checkpoints().advance_to_broadcast(&mut left_at_broadcast, &stx, &[original.clone()]).unwrap();
    let mut left_at_notary = a.checkpoints().begin("SendMessage").unwrap();
    a.checkpoints().advance(&mut left_at_notary, FlowStep::Notarising, None).unwrap();
    let left_early = a.checkpoints().begin("SendMessage").unwrap();

    assert_eq!(a.recover_interrupted().unwrap(), 1);
    let still_there: Vec<u64> = a.checkpoints().interrupted().unwrap().iter().map(|cp| cp.run_id).collect();
    assert_eq!(still_there, vec![left_at_notary.run_id, left_early.run_id]);
    assert_eq!(a.vault().get(&original.reference).unwrap().unwrap().consumed_by, Some(stx.id));
    assert_eq!(a.outbox().pending().unwrap()[0].1.peers, vec!["PartyB".to_string()]);

    assert_eq!(a.resume_broadcasts().await.unwrap(), 1);
    assert!(a.outbox().pending().unwrap().is_empty());
    assert_eq!(b.vault().get(&original.reference).unwrap().unwrap().consumed_by, Some(stx.id));
    let open = b.repository().find_all_new_by_sender(a.identity()).unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].state.notary, new);
}
