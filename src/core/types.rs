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

//! Deterministic core types and canonical encoding helpers.

use bincode::Options;
use ring::digest;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Hard cap for any single decoded wire or disk payload.
pub const MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Encoding failed.
    #[error("serialization")]
    Serialize,
    /// Bytes are not a valid encoding.
    #[error("deserialization")]
    Deserialize,
    /// Input exceeds the decode limit.
    #[error("size limit exceeded")]
    TooLarge,
}

/// Canonical bincode options (deterministic).
fn bincode_opts() -> impl Options {
    // Fixint encoding provides a stable integer representation.
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with deterministic rules. Requires deterministic container ordering (use BTreeMap/BTreeSet).
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    // Cap inside the deserializer as well so container lengths cannot blow up allocation.
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// Decode using [`MAX_PAYLOAD_BYTES`].
pub fn decode_canonical<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    decode_canonical_limited(bytes, MAX_PAYLOAD_BYTES)
}

/// 256-bit hash type (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct H256([u8; 32]);

impl H256 {
    /// All-zero hash.
    pub const ZERO: H256 = H256([0u8; 32]);

    /// Construct from raw bytes.
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }
    /// Return bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
    /// SHA-256 of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let d = digest::digest(&digest::SHA256, data);
        let mut out = [0u8; 32];
        out.copy_from_slice(d.as_ref());
        Self(out)
    }
}

impl fmt::Display for H256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Ed25519 signature bytes (expected 64).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// Ed25519 public key bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Parse from a hex string (32 bytes).
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s.trim()).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs.
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

/// A well-known network identity: legal name plus owning key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Party {
    /// Legal name, unique within a network.
    pub name: String,
    /// Key that signs on behalf of this party.
    pub owning_key: PublicKey,
}

impl Party {
    /// Construct a party.
    pub fn new(name: impl Into<String>, owning_key: PublicKey) -> Self {
        Self { name: name.into(), owning_key }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Identifier that stays stable across an update chain of states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinearId(pub Uuid);

impl LinearId {
    /// Fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinearId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinearId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Pointer to an output of a committed transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateRef {
    /// Producing transaction.
    pub tx_id: H256,
    /// Output index within that transaction.
    pub index: u32,
}

impl StateRef {
    /// Stable key bytes: tx id || index (big endian). Sorts by transaction, then index.
    pub fn key_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(self.tx_id.as_bytes());
        out[32..].copy_from_slice(&self.index.to_be_bytes());
        out
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tx_id, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_roundtrip_rejects_trailing_bytes() {
        let r = StateRef { tx_id: H256::digest(b"tx"), index: 7 };
        let mut bytes = encode_canonical(&r).unwrap();
        let back: StateRef = decode_canonical(&bytes).unwrap();
        assert_eq!(back, r);
        bytes.push(0);
        assert!(decode_canonical::<StateRef>(&bytes).is_err());
    }

    #[test]
    fn decode_respects_cap() {
        let bytes = encode_canonical(&vec![1u8; 64]).unwrap();
        assert!(matches!(
            decode_canonical_limited::<Vec<u8>>(&bytes, 16),
            Err(CodecError::TooLarge)
        ));
    }

    #[test]
    fn public_key_hex_parse() {
        let pk = PublicKey([7u8; 32]);
        assert_eq!(PublicKey::from_hex(&hex::encode(pk.0)), Some(pk));
        assert_eq!(PublicKey::from_hex("abcd"), None);
    }
}
