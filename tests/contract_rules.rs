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

use common::{identity, message_ref};
use ledgerflow::core::ledger::{
    builder::{reply_signers, BuildError, TransactionBuilder},
    contract::{gift_price_matches, ContractError},
    states::{ContractState, GiftState, MessageState},
    transaction::CommandData,
};
use ledgerflow::core::types::{LinearId, Party, PublicKey};
use proptest::prelude::*;

fn notary(i: u8) -> Party {
    Party::new(format!("Notary-{i}"), PublicKey([100 + i; 32]))
}

fn gift(recipient: &Party, amount: u64, total: f64) -> ContractState {
    ContractState::Gift(GiftState {
        symbol: "acn".into(),
        amount,
        price: total,
        recipient: recipient.clone(),
        linear_id: LinearId::new(),
    })
}

fn gift_builder(recipient: &Party, oracle: &Party, unit: f64, amount: u64, total: f64) -> TransactionBuilder {
    let mut b = TransactionBuilder::new(notary(0));
    b.add_output_state(gift(recipient, amount, total)).add_command(
        CommandData::GiveAway { symbol: "acn".into(), price: unit },
        [recipient.owning_key, oracle.owning_key],
    );
    b
}

#[test]
fn acn_gift_of_100_at_50_is_worth_5000() {
    let (_, b) = identity("PartyB");
    let (_, oracle) = identity("Oracle");
    assert!(gift_builder(&b, &oracle, 50.0, 100, 5000.0).build().is_ok());
    let err = gift_builder(&b, &oracle, 50.0, 100, 5001.0).build().unwrap_err();
    assert!(matches!(err, BuildError::Contract(ContractError::Violation { command: "GiveAway", .. })));
}

#[test]
fn gift_needs_the_recipient_signature() {
    let (_, b) = identity("PartyB");
    let (_, oracle) = identity("Oracle");
    let mut builder = TransactionBuilder::new(notary(0));
    builder
        .add_output_state(gift(&b, 1, 10.0))
        .add_command(CommandData::GiveAway { symbol: "acn".into(), price: 10.0 }, [oracle.owning_key]);
    assert!(matches!(builder.build(), Err(BuildError::Contract(_))));
}

#[test]
fn send_creates_exactly_one_message_without_inputs() {
    let (_, a) = identity("PartyA");
    let (_, b) = identity("PartyB");
    let msg = |s: &Party, r: &Party| {
        ContractState::Message(MessageState {
            sender: s.clone(),
            recipient: r.clone(),
            contents: "hello".into(),
            kind: "POST".into(),
            linear_id: LinearId::new(),
        })
    };
    let signers = [a.owning_key, b.owning_key];

    let mut ok = TransactionBuilder::new(notary(0));
    ok.add_output_state(msg(&a, &b)).add_command(CommandData::Send, signers);
    assert!(ok.build().is_ok());

    let mut two = TransactionBuilder::new(notary(0));
    two.add_output_state(msg(&a, &b)).add_output_state(msg(&a, &b)).add_command(CommandData::Send, signers);
    assert!(matches!(two.build(), Err(BuildError::Contract(_))));

    let mut with_input = TransactionBuilder::new(notary(0));
    with_input
        .add_input_state(message_ref(&a, &b, "POST", &notary(0), b"old"))
        .add_output_state(msg(&a, &b))
        .add_command(CommandData::Send, signers);
    assert!(matches!(with_input.build(), Err(BuildError::Contract(_))));

    let mut unsigned_recipient = TransactionBuilder::new(notary(0));
    unsigned_recipient.add_output_state(msg(&a, &b)).add_command(CommandData::Send, [a.owning_key]);
    assert!(matches!(unsigned_recipient.build(), Err(BuildError::Contract(_))));
}

#[test]
fn reply_signers_cover_every_consumed_participant() {
    let (_, a) = identity("PartyA");
    let (_, b) = identity("PartyB");
    let (_, c) = identity("PartyC");
    let inputs = vec![
        message_ref(&a, &b, "POST", &notary(0), b"1"),
        message_ref(&c, &b, "mail", &notary(0), b"2"),
    ];
    let signers = reply_signers(&inputs, &b).unwrap();
    assert_eq!(signers.len(), 3);
    assert!(matches!(reply_signers(&[], &b), Err(BuildError::UnderivableSigners(_))));

    let mut short = TransactionBuilder::new(notary(0));
    for i in inputs.iter() {
        short.add_input_state(i.clone());
    }
    short.add_command(CommandData::Reply, [a.owning_key, b.owning_key]);
    assert!(matches!(short.build(), Err(BuildError::Contract(_))));
}

#[test]
fn inputs_under_another_notary_must_be_migrated_first() {
    let (_, a) = identity("PartyA");
    let (_, b) = identity("PartyB");
    let stray = message_ref(&a, &b, "POST", &notary(1), b"1");
    let mut builder = TransactionBuilder::new(notary(0));
    builder
        .add_input_state(message_ref(&a, &b, "POST", &notary(0), b"0"))
        .add_input_state(stray.clone())
        .add_command(CommandData::Reply, [a.owning_key, b.owning_key]);
    assert!(matches!(builder.build(), Err(BuildError::MixedNotaries(r)) if r == stray.reference));
}

#[test]
fn commands_without_signers_are_malformed() {
    let (_, a) = identity("PartyA");
    let (_, b) = identity("PartyB");
    let mut builder = TransactionBuilder::new(notary(0));
    builder
        .add_input_state(message_ref(&a, &b, "POST", &notary(0), b"0"))
        .add_command(CommandData::Reply, []);
    assert!(matches!(builder.build(), Err(BuildError::NoSigners("Reply"))));
}

#[test]
fn consuming_the_same_state_twice_is_rejected() {
    let (_, a) = identity("PartyA");
    let (_, b) = identity("PartyB");
    let input = message_ref(&a, &b, "POST", &notary(0), b"0");
    let mut builder = TransactionBuilder::new(notary(0));
    builder
        .add_input_state(input.clone())
        .add_input_state(input.clone())
        .add_command(CommandData::Reply, [a.owning_key, b.owning_key]);
    assert!(matches!(
        builder.build(),
        Err(BuildError::Contract(ContractError::DuplicateInput(r))) if r == input.reference
    ));
}

proptest! {
    #[test]
    fn gift_total_must_be_bit_exact(cents in 1u64..10_000_000, amount in 1u64..100_000) {
        let unit = cents as f64 / 100.0;
        let total = unit * amount as f64;
        prop_assert!(gift_price_matches(unit, amount, total));
        let drifted = f64::from_bits(total.to_bits() + 1);
        prop_assert!(!gift_price_matches(unit, amount, drifted));

        let recipient = Party::new("PartyB", PublicKey([1; 32]));
        let oracle = Party::new("Oracle", PublicKey([2; 32]));
        prop_assert!(gift_builder(&recipient, &oracle, unit, amount, total).build().is_ok());
        prop_assert!(gift_builder(&recipient, &oracle, unit, amount, drifted).build().is_err());
    }
}
