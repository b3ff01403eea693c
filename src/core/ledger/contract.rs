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

//! Contract rules, one set per command type.
//!
//! `verify` is a pure predicate over a resolved transaction. The builder runs it before the
//! initiator signs, and every responder runs it again on its own resolution of the inputs
//! before adding a signature.

use crate::core::{
    ledger::{
        states::ContractState,
        transaction::{Command, CommandData, LedgerTransaction},
    },
    types::{PublicKey, StateRef},
};
use std::collections::BTreeSet;
use thiserror::Error;

/// Contract verification failure.
#[derive(Debug, Error, PartialEq)]
pub enum ContractError {
    /// Every transaction carries exactly one command.
    #[error("expected exactly one command, found {0}")]
    CommandCount(usize),
    /// The command's rules were broken.
    #[error("{command}: {reason}")]
    Violation {
        /// Command name.
        command: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// An input is governed by a notary other than the transaction's.
    #[error("state {0} is governed by a different notary")]
    NotaryMismatch(StateRef),
    /// An output is governed by a notary other than the transaction's.
    #[error("output {0} is governed by a different notary")]
    OutputNotaryMismatch(usize),
    /// The same input appears twice.
    #[error("state {0} is consumed twice")]
    DuplicateInput(StateRef),
}

fn require(cond: bool, command: &CommandData, reason: &str) -> Result<(), ContractError> {
    if cond {
        Ok(())
    } else {
        Err(ContractError::Violation { command: command.name(), reason: reason.to_string() })
    }
}

/// Verify every contract invariant of `ltx`.
pub fn verify(ltx: &LedgerTransaction) -> Result<(), ContractError> {
    let [command] = ltx.commands.as_slice() else {
        return Err(ContractError::CommandCount(ltx.commands.len()));
    };
    require(!command.signers.is_empty(), &command.data, "command has no required signers")?;

    let mut seen = BTreeSet::new();
    for input in ltx.inputs.iter() {
        if !seen.insert(input.reference) {
            return Err(ContractError::DuplicateInput(input.reference));
        }
        if input.state.notary != ltx.notary {
            return Err(ContractError::NotaryMismatch(input.reference));
        }
    }
    if !matches!(command.data, CommandData::NotaryChange { .. }) {
        for (i, output) in ltx.outputs.iter().enumerate() {
            if output.notary != ltx.notary {
                return Err(ContractError::OutputNotaryMismatch(i));
            }
        }
    }

    match &command.data {
        CommandData::Send => verify_send(ltx, command),
        CommandData::Reply => verify_reply(ltx, command),
        CommandData::GiveAway { symbol, price } => verify_give_away(ltx, command, symbol, *price),
        CommandData::NotaryChange { new_notary } => {
            let c = &command.data;
            require(ltx.inputs.len() == 1, c, "exactly one input must be reissued")?;
            require(ltx.outputs.len() == 1, c, "exactly one output must be created")?;
            let (input, output) = (&ltx.inputs[0].state, &ltx.outputs[0]);
            require(input.data == output.data, c, "state content must not change")?;
            require(&output.notary == new_notary, c, "output must point at the new notary")?;
            require(new_notary != &ltx.notary, c, "new notary must differ from the current one")?;
            let participants = input.data.participant_keys();
            require(
                command.signers.iter().all(|k| participants.contains(k)),
                c,
                "only participants of the state may change its notary",
            )
        }
    }
}

fn verify_send(ltx: &LedgerTransaction, command: &Command) -> Result<(), ContractError> {
    let c = &command.data;
    require(ltx.inputs.is_empty(), c, "no inputs may be consumed when sending a message")?;
    require(ltx.outputs.len() == 1, c, "exactly one output must be created when sending a message")?;
    let Some(msg) = ltx.outputs[0].data.as_message() else {
        return Err(ContractError::Violation { command: c.name(), reason: "output must be a message".into() });
    };
    require(msg.sender != msg.recipient, c, "sender and recipient must differ")?;
    require(
        is_superset(&command.signers, &ltx.outputs[0].data.participant_keys()),
        c,
        "every participant of the message must sign",
    )
}

fn verify_reply(ltx: &LedgerTransaction, command: &Command) -> Result<(), ContractError> {
    let c = &command.data;
    require(!ltx.inputs.is_empty(), c, "a reply must consume at least one message")?;

    let mut consumed_participants = BTreeSet::new();
    let mut answered = Vec::with_capacity(ltx.inputs.len());
    for input in ltx.inputs.iter() {
        let Some(msg) = input.state.data.as_message() else {
            return Err(ContractError::Violation { command: c.name(), reason: "inputs must be messages".into() });
        };
        consumed_participants.extend(input.state.data.participant_keys());
        answered.push(msg);
    }
    require(
        is_superset(&command.signers, &consumed_participants),
        c,
        "every participant of every consumed message must sign",
    )?;

    for output in ltx.outputs.iter() {
        let Some(reply) = output.data.as_message() else {
            return Err(ContractError::Violation { command: c.name(), reason: "outputs must be messages".into() });
        };
        let answers_an_input = answered.iter().any(|m| {
            m.linear_id == reply.linear_id && m.sender == reply.recipient && m.recipient == reply.sender
        });
        require(answers_an_input, c, "each reply must answer a consumed message")?;
        require(
            is_superset(&command.signers, &output.data.participant_keys()),
            c,
            "every participant of a reply must sign",
        )?;
    }
    Ok(())
}

fn verify_give_away(
    ltx: &LedgerTransaction,
    command: &Command,
    symbol: &str,
    price: f64,
) -> Result<(), ContractError> {
    let c = &command.data;
    require(ltx.inputs.is_empty(), c, "a gift consumes no inputs")?;
    require(ltx.outputs.len() == 1, c, "exactly one gift must be created")?;
    let ContractState::Gift(gift) = &ltx.outputs[0].data else {
        return Err(ContractError::Violation { command: c.name(), reason: "output must be a gift".into() });
    };
    require(gift.symbol == symbol, c, "gift symbol must match the command")?;
    require(gift.amount > 0, c, "gift amount must be positive")?;
    require(price.is_finite() && price > 0.0, c, "unit price must be a positive number")?;
    require(
        gift_price_matches(price, gift.amount, gift.price),
        c,
        "price of gift must equal the unit price multiplied by the amount",
    )?;
    require(
        command.signers.contains(&gift.recipient.owning_key),
        c,
        "the recipient must sign",
    )
}

/// Exact equality of `total` and `unit_price * amount` on the f64 representation.
pub fn gift_price_matches(unit_price: f64, amount: u64, total: f64) -> bool {
    (unit_price * amount as f64).to_bits() == total.to_bits()
}

fn is_superset(signers: &BTreeSet<PublicKey>, required: &BTreeSet<PublicKey>) -> bool {
    required.iter().all(|k| signers.contains(k))
}
