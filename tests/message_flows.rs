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

use common::{cluster, kinds_on_distinct_notaries};
use ledgerflow::core::flows::FlowError;
use ledgerflow::core::ledger::states::StateAndRef;
use ledgerflow::core::notary::service::NotarisationRequest;
use ledgerflow::core::state::vault::{QueryCriteria, StateStatus};
use ledgerflow::core::types::H256;

fn contents(states: &[StateAndRef]) -> Vec<String> {
    let mut out: Vec<String> = states
        .iter()
        .filter_map(|s| s.state.data.as_message().map(|m| m.contents.clone()))
        .collect();
    out.sort();
    out
}

#[tokio::test]
async fn reply_all_answers_every_open_message() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());

    a.send_message("PartyB", "first", "POST").await.unwrap();
    a.send_message("PartyB", "second", "mail").await.unwrap();
    assert_eq!(b.repository().find_all_new_not_by_sender(b.identity()).unwrap().len(), 2);

    let replies = b.reply_to_messages().await.unwrap();
    assert_eq!(replies.len(), 2);

    assert!(a.repository().find_all_new_by_sender_and_type(a.identity(), "POST").unwrap().is_empty());
    assert!(a.repository().find_all_new_by_sender(a.identity()).unwrap().is_empty());
    assert!(b.repository().find_all_new_not_by_sender(b.identity()).unwrap().is_empty());

    let answers = a.repository().find_all_new_by_sender(b.identity()).unwrap();
    assert_eq!(
        contents(&answers),
        vec!["Thanks for your message: first", "Thanks for your message: second"]
    );
    assert_eq!(net.metrics().flows_failed_total.get(), 0);
    assert!(a.checkpoints().interrupted().unwrap().is_empty());
    assert!(b.checkpoints().interrupted().unwrap().is_empty());
}

#[tokio::test]
async fn reply_keeps_linear_id_and_notary() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());

    let sent = a.send_message("PartyB", "ping", "POST").await.unwrap();
    let original = sent.output_refs().remove(0);
    let reply = b.reply_to_message(original.clone()).await.unwrap();

    let answer = &reply.tx.outputs[0];
    let (m, r) = (original.state.data.as_message().unwrap(), answer.data.as_message().unwrap());
    assert_eq!(m.linear_id, r.linear_id);
    assert_eq!((r.sender.clone(), r.recipient.clone()), (m.recipient.clone(), m.sender.clone()));
    assert_eq!(answer.notary, original.state.notary);
    assert_eq!(reply.tx.notary.name, net.network_map().router().route_by_type("POST").unwrap().name);
}

#[tokio::test]
async fn sending_to_an_unknown_party_fails_locally() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let a = net.node("PartyA").unwrap();
    assert!(matches!(a.send_message("Nobody", "x", "POST").await, Err(FlowError::UnknownParty(_))));
    assert!(matches!(a.send_message("PartyA", "x", "POST").await, Err(FlowError::MalformedProposal(_))));
    assert_eq!(net.metrics().flows_failed_total.get(), 2);
    assert!(a.vault().query(&QueryCriteria::default()).unwrap().is_empty());
}

#[tokio::test]
async fn counterparty_refuses_an_already_consumed_input() {
    let net = cluster(&["PartyA", "PartyB"], 2, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());

    let sent = a.send_message("PartyB", "once", "POST").await.unwrap();
    let original = sent.output_refs().remove(0);
    b.reply_to_message(original.clone()).await.unwrap();

    let err = b.reply_to_message(original).await.unwrap_err();
    assert!(matches!(err, FlowError::RejectedByCounterparty { ref party, .. } if party == "PartyA"));
    assert_eq!(a.repository().find_all_new_by_sender(b.identity()).unwrap().len(), 1);
}

#[tokio::test]
async fn notary_conflict_voids_the_transaction_everywhere() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());

    let sent = a.send_message("PartyB", "contested", "POST").await.unwrap();
    let original = sent.output_refs().remove(0);

    // Someone else already consumed the message at its notary.
    let notary = net.notary(&original.state.notary.name).unwrap();
    notary
        .notarise(&NotarisationRequest {
            tx_id: H256::digest(b"elsewhere"),
            inputs: vec![original.reference],
            notary: notary.identity().clone(),
        })
        .unwrap();

    let err = b.reply_to_message(original.clone()).await.unwrap_err();
    assert!(matches!(err, FlowError::DoubleSpend(ref c) if c[0].state == original.reference));
    assert_eq!(net.metrics().double_spends_total.get(), 1);

    // No reply became visible on either side.
    assert!(a.repository().find_all_new_by_sender(b.identity()).unwrap().is_empty());
    assert!(b.repository().find_all_new_by_sender(b.identity()).unwrap().is_empty());
    let all = QueryCriteria { status: StateStatus::All, ..QueryCriteria::default() };
    assert_eq!(b.vault().query(&all).unwrap().len(), 1);
}

#[tokio::test]
async fn delete_all_migrates_strays_to_the_majority_notary() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());
    let (major, minor) = kinds_on_distinct_notaries(3);

    a.send_message("PartyB", "one", &major).await.unwrap();
    a.send_message("PartyB", "two", &major).await.unwrap();
    let stray = a.send_message("PartyB", "three", &minor).await.unwrap().output_refs().remove(0);

    let stx = b.delete_all_messages_from_party("PartyA").await.unwrap();
    let router = net.network_map().router();
    assert_eq!(&stx.tx.notary, router.route_by_type(&major).unwrap());
    assert_eq!(stx.tx.inputs.len(), 3);
    assert!(stx.tx.outputs.is_empty());

    // The stray was consumed by a notary change at its original notary.
    let old_notary = net.notary(&stray.state.notary.name).unwrap();
    assert!(old_notary.consumed_by(&stray.reference).unwrap().is_some());

    assert!(b.repository().find_all_new_by_sender(a.identity()).unwrap().is_empty());
    assert!(a.repository().find_all_new_by_sender(a.identity()).unwrap().is_empty());
}

#[tokio::test]
async fn delete_by_type_leaves_other_types_open() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());

    a.send_message("PartyB", "p1", "POST").await.unwrap();
    a.send_message("PartyB", "p2", "POST").await.unwrap();
    a.send_message("PartyB", "m1", "mail").await.unwrap();

    let stx = b.delete_all_messages_from_party_by_type("PartyA", "POST").await.unwrap();
    assert_eq!(stx.tx.inputs.len(), 2);

    let left = b.repository().find_all_new_by_sender(a.identity()).unwrap();
    assert_eq!(contents(&left), vec!["m1"]);
    assert!(a.repository().find_all_new_by_sender_and_type(a.identity(), "POST").unwrap().is_empty());
}

#[tokio::test]
async fn deleting_nothing_is_an_error() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let b = net.node("PartyB").unwrap();
    assert!(matches!(b.delete_all_messages_from_party("PartyA").await, Err(FlowError::NoNotaryFound)));
    assert!(matches!(
        b.delete_all_messages_from_party_by_type("PartyA", "POST").await,
        Err(FlowError::MalformedProposal(_))
    ));
}

#[tokio::test]
async fn unreachable_counterparty_aborts_without_commit() {
    let net = cluster(&["PartyA", "PartyB"], 1, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());
    net.network().unregister(b.identity());

    let err = a.send_message("PartyB", "anyone?", "POST").await.unwrap_err();
    assert!(matches!(err, FlowError::UnreachableParty(ref p) if p == "PartyB"));
    assert!(a.vault().query(&QueryCriteria::default()).unwrap().is_empty());
}

#[tokio::test]
async fn committed_migration_reaches_a_participant_that_was_away() {
    let net = cluster(&["PartyA", "PartyB"], 3, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());
    let (major, minor) = kinds_on_distinct_notaries(3);

    a.send_message("PartyB", "one", &major).await.unwrap();
    a.send_message("PartyB", "two", &major).await.unwrap();
    let stray = a.send_message("PartyB", "three", &minor).await.unwrap().output_refs().remove(0);

    net.network().unregister(a.identity());
    let err = b.delete_all_messages_from_party("PartyA").await.unwrap_err();
    assert!(matches!(err, FlowError::UnreachableParty(ref p) if p == "PartyA"));

    // The notary change went through; A is owed it.
    let old_notary = net.notary(&stray.state.notary.name).unwrap();
    let migration = old_notary.consumed_by(&stray.reference).unwrap().unwrap();
    let owed = b.outbox().pending().unwrap();
    assert_eq!(owed.len(), 1);
    assert_eq!(owed[0].1.stx.id, migration);
    assert_eq!(owed[0].1.peers, vec!["PartyA".to_string()]);

    let inbox = net.network().register(a.identity());
    let _driver = a.spawn_driver(inbox);
    b.resume_broadcasts().await.unwrap();
    assert!(b.outbox().pending().unwrap().is_empty());
    let seen_by_a = a.vault().get(&stray.reference).unwrap().unwrap();
    assert_eq!(seen_by_a.consumed_by, Some(migration));

    b.delete_all_messages_from_party("PartyA").await.unwrap();
    assert!(a.repository().find_all_new_by_sender(a.identity()).unwrap().is_empty());
    assert!(b.repository().find_all_new_by_sender(a.identity()).unwrap().is_empty());
}

#[tokio::test]
async fn later_commits_queue_behind_an_owed_delivery() {
    let net = cluster(&["PartyA", "PartyB"], 2, &[]);
    let (a, b) = (net.node("PartyA").unwrap(), net.node("PartyB").unwrap());
    let original = a.send_message("PartyB", "move me", "POST").await.unwrap().output_refs().remove(0);
    let target = net
        .network_map()
        .notaries()
        .iter()
        .find(|n| **n != original.state.notary)
        .unwrap()
        .clone();

    net.network().unregister(a.identity());
    let mut cp = b.checkpoints().begin("ChangeNotary").unwrap();
    let moved = b.change_notary(&mut cp, original.clone(), &target).await.unwrap();
    b.checkpoints().finish(&cp).unwrap();
    assert_eq!(moved.state.notary, target);
    assert_eq!(b.outbox().pending().unwrap().len(), 1);

    let inbox = net.network().register(a.identity());
    let _driver = a.spawn_driver(inbox);
    // The reply consumes the migrated state, so A must see the migration first.
    b.reply_to_message(moved.clone()).await.unwrap();
    assert!(b.outbox().pending().unwrap().is_empty());
    assert!(a.vault().get(&original.reference).unwrap().unwrap().consumed_by.is_some());
    assert!(a.vault().get(&moved.reference).unwrap().unwrap().consumed_by.is_some());
    assert_eq!(a.repository().find_all_new_by_sender(b.identity()).unwrap().len(), 1);
}
