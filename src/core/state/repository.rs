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

//! Indexed read path over open (unspent) message states.

use crate::core::{
    ledger::states::StateAndRef,
    state::{
        persistent_state::StateError,
        vault::{QueryCriteria, SenderFilter, StateStatus, Vault},
    },
    types::Party,
};

/// Query shapes used by the message workflows. Results never include spent states.
#[derive(Clone)]
pub struct MessageRepository {
    vault: Vault,
}

impl MessageRepository {
    /// Repository over `vault`.
    pub fn new(vault: Vault) -> Self {
        Self { vault }
    }

    /// Open messages not sent by `sender`.
    pub fn find_all_new_not_by_sender(&self, sender: &Party) -> Result<Vec<StateAndRef>, StateError> {
        self.vault.query(&QueryCriteria {
            status: StateStatus::Unconsumed,
            sender: Some(SenderFilter::IsNot(sender.name.clone())),
            kind: None,
        })
    }

    /// Open messages sent by `sender`.
    pub fn find_all_new_by_sender(&self, sender: &Party) -> Result<Vec<StateAndRef>, StateError> {
        self.vault.query(&QueryCriteria {
            status: StateStatus::Unconsumed,
            sender: Some(SenderFilter::Is(sender.name.clone())),
            kind: None,
        })
    }

    /// Open messages of type `kind` sent by `sender`.
    pub fn find_all_new_by_sender_and_type(
        &self,
        sender: &Party,
        kind: &str,
    ) -> Result<Vec<StateAndRef>, StateError> {
        self.vault.query(&QueryCriteria {
            status: StateStatus::Unconsumed,
            sender: Some(SenderFilter::Is(sender.name.clone())),
            kind: Some(kind.to_string()),
        })
    }
}
