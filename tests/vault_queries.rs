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

use common::identity;
use ledgerflow::core::ledger::builder::{reply_signers, TransactionBuilder};
use ledgerflow::core::ledger::states::{ContractState, MessageState, StateAndRef};
use ledgerflow::core::ledger::transaction::{CommandData, SignedTransaction};
use ledgerflow::core::state::persistent_state::PersistentState;
use ledgerflow::core::state::repository::MessageRepository;
use ledgerflow::core::state::vault::{QueryCriteria, SenderFilter, StateStatus, Vault};
use ledgerflow::core::types::{LinearId, Party};

struct Parties {
    a: Party,
    b: Party,
    notary: Party,
}

fn parties() -> Parties {
    Parties { a: identity("PartyA").1, b: identity("PartyB").1, notary: identity("Notary-0").1 }
}

fn send(p: &Parties, from: &Party, to: &Party, contents: &str, kind: &str) -> SignedTransaction {
    let message = MessageState {
        sender: from.clone(),
        recipient: to.clone(),
        contents: contents.to_string(),
        kind: kind.to_string(),
        linear_id: LinearId::new(),
    };
    let mut builder = TransactionBuilder::new(p.notary.clone());
    builder
        .add_output_state(ContractState::Message(message))
        .add_command(CommandData::Send, [from.owning_key, to.owning_key]);
    let (proposal, _) = builder.build().unwrap();
    SignedTransaction::new(proposal, Vec::new()).unwrap()
}

fn reply(p: &Parties, input: StateAndRef, by: &Party) -> SignedTransaction {
    let answer = input.state.data.as_message().unwrap().reply();
    let signers = reply_signers(std::slice::from_ref(&input), by).unwrap();
    let mut builder = TransactionBuilder::new(p.notary.clone());
    builder
        .add_input_state(input)
        .add_output_state(ContractState::Message(answer))
        .add_command(CommandData::Reply, signers);
    let (proposal, _) = builder.build().unwrap();
    SignedTransaction::new(proposal, Vec::new()).unwrap()
}

fn contents(states: &[StateAndRef]) -> Vec<&str> {
    states.iter().filter_map(|s| s.state.data.as_message().map(|m| m.contents.as_str())).collect()
}

#[test]
fn spent_states_leave_the_default_query() {
    let p = parties();
    let vault = Vault::open(&PersistentState::temporary().unwrap()).unwrap();

    let sent = send(&p, &p.a, &p.b, "hello", "POST");
    vault.record_transaction(&sent, &p.b).unwrap();
    let original = sent.output_refs().remove(0);
    let answered = reply(&p, original.clone(), &p.b);
    vault.record_transaction(&answered, &p.b).unwrap();

    let open = vault.query(&QueryCriteria::default()).unwrap();
    assert_eq!(contents(&open), vec!["Thanks for your message: hello"]);

    let spent = vault
        .query(&QueryCriteria { status: StateStatus::Consumed, ..QueryCriteria::default() })
        .unwrap();
    assert_eq!(spent, vec![original.clone()]);
    assert_eq!(vault.get(&original.reference).unwrap().unwrap().consumed_by, Some(answered.id));

    let all = vault.query(&QueryCriteria { status: StateStatus::All, ..QueryCriteria::default() }).unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn recording_twice_changes_nothing() {
    let p = parties();
    let vault = Vault::open(&PersistentState::temporary().unwrap()).unwrap();
    let sent = send(&p, &p.a, &p.b, "once", "POST");

    assert_eq!(vault.record_transaction(&sent, &p.b).unwrap().len(), 1);
    assert!(vault.record_transaction(&sent, &p.b).unwrap().is_empty());
    assert_eq!(vault.query(&QueryCriteria::default()).unwrap().len(), 1);
}

#[test]
fn only_relevant_outputs_are_kept() {
    let p = parties();
    let vault = Vault::open(&PersistentState::temporary().unwrap()).unwrap();
    let (_, carol) = identity("PartyC");

    let sent = send(&p, &p.a, &carol, "not for b", "POST");
    assert!(vault.record_transaction(&sent, &p.b).unwrap().is_empty());
    assert!(vault.query(&QueryCriteria::default()).unwrap().is_empty());
    assert!(vault.transaction(&sent.id).unwrap().is_some());
}

#[test]
fn repository_filters_by_sender_and_type() {
    let p = parties();
    let vault = Vault::open(&PersistentState::temporary().unwrap()).unwrap();
    for stx in [
        send(&p, &p.a, &p.b, "a-post", "POST"),
        send(&p, &p.a, &p.b, "a-mail", "mail"),
        send(&p, &p.b, &p.a, "b-post", "POST"),
    ] {
        vault.record_transaction(&stx, &p.b).unwrap();
    }
    let repo = MessageRepository::new(vault.clone());

    assert_eq!(contents(&repo.find_all_new_by_sender(&p.a).unwrap()), vec!["a-post", "a-mail"]);
    assert_eq!(contents(&repo.find_all_new_not_by_sender(&p.b).unwrap()), vec!["a-post", "a-mail"]);
    assert_eq!(contents(&repo.find_all_new_by_sender_and_type(&p.a, "mail").unwrap()), vec!["a-mail"]);
    assert!(repo.find_all_new_by_sender_and_type(&p.b, "mail").unwrap().is_empty());

    let not_a = vault
        .query(&QueryCriteria { sender: Some(SenderFilter::IsNot("PartyA".into())), ..QueryCriteria::default() })
        .unwrap();
    assert_eq!(contents(&not_a), vec!["b-post"]);
}

#[test]
fn vault_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault").to_string_lossy().to_string();
    let p = parties();
    let sent = send(&p, &p.a, &p.b, "durable", "POST");
    let original = sent.output_refs().remove(0);

    {
        let store = PersistentState::open(&path).unwrap();
        let vault = Vault::open(&store).unwrap();
        vault.record_transaction(&sent, &p.b).unwrap();
        store.flush().unwrap();
    }

    let store = PersistentState::open(&path).unwrap();
    let vault = Vault::open(&store).unwrap();
    assert_eq!(vault.query(&QueryCriteria::default()).unwrap(), vec![original.clone()]);
    assert_eq!(vault.get(&original.reference).unwrap().unwrap().consumed_by, None);
    assert_eq!(vault.transaction(&sent.id).unwrap().unwrap(), sent);

    // New records continue after the reopened sequence.
    let later = send(&p, &p.a, &p.b, "later", "POST");
    vault.record_transaction(&later, &p.b).unwrap();
    assert_eq!(contents(&vault.query(&QueryCriteria::default()).unwrap()), vec!["durable", "later"]);
}
