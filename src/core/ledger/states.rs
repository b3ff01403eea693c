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

//! Shared states: immutable facts held by a fixed participant set.

use crate::core::types::{LinearId, Party, PublicKey, StateRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A message exchanged between two parties. `kind` is free text used for notary routing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageState {
    /// Author.
    pub sender: Party,
    /// Addressee.
    pub recipient: Party,
    /// Message body.
    pub contents: String,
    /// Free-text message type ("POST", "mail", ...).
    pub kind: String,
    /// Stable identity across replies.
    pub linear_id: LinearId,
}

impl MessageState {
    /// The reply to this message: parties swapped, same linear id.
    pub fn reply(&self) -> MessageState {
        MessageState {
            sender: self.recipient.clone(),
            recipient: self.sender.clone(),
            contents: format!("Thanks for your message: {}", self.contents),
            kind: self.kind.clone(),
            linear_id: self.linear_id,
        }
    }
}

/// A gift of `amount` units of stock `symbol`, valued at `price` in total.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GiftState {
    /// Ticker symbol.
    pub symbol: String,
    /// Number of units gifted.
    pub amount: u64,
    /// Total value: unit price * amount.
    pub price: f64,
    /// Receiving party. The giver is not a participant.
    pub recipient: Party,
    /// Stable identity.
    pub linear_id: LinearId,
}

/// Any state this ledger understands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ContractState {
    /// Message state.
    Message(MessageState),
    /// Stock gift state.
    Gift(GiftState),
}

impl ContractState {
    /// Parties with standing interest in this state.
    pub fn participants(&self) -> Vec<Party> {
        match self {
            ContractState::Message(m) => {
                if m.sender == m.recipient {
                    vec![m.sender.clone()]
                } else {
                    vec![m.sender.clone(), m.recipient.clone()]
                }
            }
            ContractState::Gift(g) => vec![g.recipient.clone()],
        }
    }

    /// Owning keys of all participants.
    pub fn participant_keys(&self) -> BTreeSet<PublicKey> {
        self.participants().into_iter().map(|p| p.owning_key).collect()
    }

    /// Linear identifier.
    pub fn linear_id(&self) -> LinearId {
        match self {
            ContractState::Message(m) => m.linear_id,
            ContractState::Gift(g) => g.linear_id,
        }
    }

    /// Message view, if this is a message.
    pub fn as_message(&self) -> Option<&MessageState> {
        match self {
            ContractState::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Gift view, if this is a gift.
    pub fn as_gift(&self) -> Option<&GiftState> {
        match self {
            ContractState::Gift(g) => Some(g),
            _ => None,
        }
    }
}

/// A state together with the notary currently governing it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionState {
    /// State payload.
    pub data: ContractState,
    /// Governing notary.
    pub notary: Party,
}

/// A committed state and where it was produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateAndRef {
    /// The state.
    pub state: TransactionState,
    /// Producing transaction output.
    pub reference: StateRef,
}
