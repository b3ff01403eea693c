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

//! Session payloads.

use crate::core::{
    ledger::{
        filtered::FilteredView,
        states::StateAndRef,
        transaction::{SignedTransaction, TransactionSignature},
    },
    oracle::validator::AttestationError,
};
use serde::{Deserialize, Serialize};

/// Initiator to counterparty: please sign. The consumed states travel with the proposal so a
/// counterparty that has not seen them can still verify the contract rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignRequest {
    /// Proposal signed by the initiator.
    pub stx: SignedTransaction,
    /// Resolved inputs, in input order.
    pub inputs: Vec<StateAndRef>,
}

/// Counterparty reply to a [`SignRequest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SignResponse {
    /// Signature over the transaction id.
    Signed(TransactionSignature),
    /// Refusal with a reason.
    Rejected(String),
}

/// Notarised transaction to record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FinalityRequest {
    /// Fully signed, notarised transaction.
    pub stx: SignedTransaction,
    /// Resolved inputs, in input order.
    pub inputs: Vec<StateAndRef>,
}

/// Participant reply to a [`FinalityRequest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FinalityAck {
    /// Recorded; number of new relevant states.
    Recorded(usize),
    /// Not recorded.
    Rejected(String),
}

/// Initiator to oracle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttestRequest {
    /// The only content the oracle gets to see.
    pub view: FilteredView,
}

/// Oracle reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AttestResponse {
    /// Signature over the view identity.
    Signed(TransactionSignature),
    /// Refusal.
    Rejected(AttestationError),
}
