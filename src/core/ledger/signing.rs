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
#![deny(missing_docs)]

//! Domain-separated signing bytes for transaction signatures.

use crate::core::types::{PublicKey, H256};
use serde::Serialize;

const TX_DOMAIN: &[u8] = b"Ledgerflow-Tx-Sig-v1";
const FILTERED_DOMAIN: &[u8] = b"Ledgerflow-Filtered-Sig-v1";
const UNIQUENESS_DOMAIN: &[u8] = b"Ledgerflow-Uniqueness-v1";

/// Signature over a full transaction: domain || tx_id
pub fn tx_signing_bytes(tx_id: &H256) -> Vec<u8> {
    let mut out = Vec::with_capacity(TX_DOMAIN.len() + 32);
    out.extend_from_slice(TX_DOMAIN);
    out.extend_from_slice(tx_id.as_bytes());
    out
}

/// Signature over a filtered view: domain || view_id
///
/// The view id already commits to the transaction id (see `filtered::FilteredView::view_id`).
pub fn filtered_signing_bytes(view_id: &H256) -> Vec<u8> {
    let mut out = Vec::with_capacity(FILTERED_DOMAIN.len() + 32);
    out.extend_from_slice(FILTERED_DOMAIN);
    out.extend_from_slice(view_id.as_bytes());
    out
}

/// Notary uniqueness attestation: domain || tx_id || notary key
pub fn uniqueness_signing_bytes(tx_id: &H256, notary: &PublicKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(UNIQUENESS_DOMAIN.len() + 32 + 32);
    out.extend_from_slice(UNIQUENESS_DOMAIN);
    out.extend_from_slice(tx_id.as_bytes());
    out.extend_from_slice(&notary.0);
    out
}

/// What a signature commits to, recovered from the domain tag of the signed bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningPurpose {
    /// A full transaction.
    Transaction,
    /// An oracle's filtered view.
    FilteredView,
    /// A notary's uniqueness certificate.
    Uniqueness,
    /// Anything else.
    Other,
}

/// Classify signing bytes by their domain tag.
pub fn purpose_of(msg: &[u8]) -> SigningPurpose {
    if msg.starts_with(TX_DOMAIN) {
        SigningPurpose::Transaction
    } else if msg.starts_with(FILTERED_DOMAIN) {
        SigningPurpose::FilteredView
    } else if msg.starts_with(UNIQUENESS_DOMAIN) {
        SigningPurpose::Uniqueness
    } else {
        SigningPurpose::Other
    }
}
