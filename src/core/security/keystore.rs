#![forbid(unsafe_code)]
#![deny(missing_docs)]
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

//! Party identities: one Ed25519 key per party, notary and oracle.
//!
//! A persistent identity lives in `<dir>/identity.key` (PKCS#8, owner-only) and keeps a JSON
//! lines audit of what it signed in `<dir>/audit.log`. Ephemeral identities exist only in memory.

use ring::{
    rand::SystemRandom,
    signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519},
};
use serde::Serialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Instant, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::warn;
use zeroize::Zeroizing;

use crate::core::{
    ledger::signing::{purpose_of, SigningPurpose},
    types::{PublicKey, Signature},
};

const KEY_FILE: &str = "identity.key";
const AUDIT_FILE: &str = "audit.log";
const AUDIT_MAX_BYTES: u64 = 16 * 1024 * 1024;
const AUDIT_GENERATIONS: usize = 3;
const SIGN_BURST: f64 = 2_000.0;
const SIGNS_PER_SEC: f64 = 10_000.0;

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// The key file or audit log could not be read or written.
    #[error("key file io")]
    Io,
    /// The stored key is not a valid Ed25519 PKCS#8 document.
    #[error("invalid key encoding")]
    InvalidKey,
    /// The signing budget is exhausted.
    #[error("signing rate exceeded")]
    RateLimited,
    /// The signature does not verify.
    #[error("bad signature")]
    BadSignature,
}

/// Where signatures come from. Lets a node sign through an HSM instead of a key file.
pub trait KeyBackend: Send + Sync {
    /// The identity's public key.
    fn public_key(&self) -> PublicKey;
    /// Sign `msg`.
    fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError>;
}

/// Ed25519 key held by this process.
pub struct Ed25519Key {
    keypair: Ed25519KeyPair,
    public: PublicKey,
}

impl Ed25519Key {
    fn from_pkcs8(der: &[u8]) -> Result<Self, KeystoreError> {
        let keypair = Ed25519KeyPair::from_pkcs8(der).map_err(|_| KeystoreError::InvalidKey)?;
        let public = <[u8; 32]>::try_from(keypair.public_key().as_ref())
            .map(PublicKey)
            .map_err(|_| KeystoreError::InvalidKey)?;
        Ok(Self { keypair, public })
    }

    fn fresh_pkcs8() -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
        let doc = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).map_err(|_| KeystoreError::InvalidKey)?;
        Ok(Zeroizing::new(doc.as_ref().to_vec()))
    }

    /// Fresh key that is never written anywhere.
    pub fn generate() -> Result<Self, KeystoreError> {
        Self::from_pkcs8(&Self::fresh_pkcs8()?)
    }

    /// Load `path`, or create it when missing.
    pub fn load_or_create(path: &Path) -> Result<Self, KeystoreError> {
        if path.exists() {
            let der = Zeroizing::new(fs::read(path).map_err(|_| KeystoreError::Io)?);
            return Self::from_pkcs8(&der);
        }
        let der = Self::fresh_pkcs8()?;
        write_private(path, &der)?;
        Self::from_pkcs8(&der)
    }
}

impl KeyBackend for Ed25519Key {
    fn public_key(&self) -> PublicKey {
        self.public
    }

    fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError> {
        Ok(Signature(self.keypair.sign(msg).as_ref().to_vec()))
    }
}

fn restrict_to_owner(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    let _ = path;
}

/// Write through a temporary file and rename, so a crash never leaves half a key.
fn write_private(path: &Path, bytes: &[u8]) -> Result<(), KeystoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|_| KeystoreError::Io)?;
    }
    let tmp = path.with_extension("tmp");
    let mut f = fs::File::create(&tmp).map_err(|_| KeystoreError::Io)?;
    restrict_to_owner(&tmp);
    f.write_all(bytes).map_err(|_| KeystoreError::Io)?;
    f.sync_all().map_err(|_| KeystoreError::Io)?;
    drop(f);
    fs::rename(&tmp, path).map_err(|_| KeystoreError::Io)
}

/// Token bucket guarding the signing key.
#[derive(Debug)]
struct SignBudget {
    tokens: f64,
    refilled: Instant,
}

impl SignBudget {
    fn full() -> Self {
        Self { tokens: SIGN_BURST, refilled: Instant::now() }
    }

    fn take(&mut self) -> bool {
        let now = Instant::now();
        let earned = now.duration_since(self.refilled).as_secs_f64() * SIGNS_PER_SEC;
        self.tokens = (self.tokens + earned).min(SIGN_BURST);
        self.refilled = now;
        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

/// One line of the signing audit. Only a digest of the signed bytes is kept.
#[derive(Debug, Serialize)]
struct AuditEntry {
    at_ms: u128,
    purpose: SigningPurpose,
    key: String,
    msg_sha256: String,
}

/// Append-only JSON lines file, rotated by size.
struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    fn rotate(&self) {
        let Ok(meta) = fs::metadata(&self.path) else { return; };
        if meta.len() < AUDIT_MAX_BYTES {
            return;
        }
        let generation = |n: usize| PathBuf::from(format!("{}.{n}", self.path.display()));
        for n in (1..AUDIT_GENERATIONS).rev() {
            let _ = fs::rename(generation(n), generation(n + 1));
        }
        let _ = fs::rename(&self.path, generation(1));
    }

    fn record(&self, key: &PublicKey, msg: &[u8]) -> Result<(), KeystoreError> {
        self.rotate();
        let entry = AuditEntry {
            at_ms: SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0),
            purpose: purpose_of(msg),
            key: hex::encode(key.0),
            msg_sha256: hex::encode(ring::digest::digest(&ring::digest::SHA256, msg).as_ref()),
        };
        let mut line = serde_json::to_vec(&entry).map_err(|_| KeystoreError::Io)?;
        line.push(b'\n');
        let mut f = fs::OpenOptions::new().create(true).append(true).open(&self.path).map_err(|_| KeystoreError::Io)?;
        restrict_to_owner(&self.path);
        f.write_all(&line).map_err(|_| KeystoreError::Io)
    }
}

/// The signing identity of one node.
pub struct Keystore {
    backend: Box<dyn KeyBackend>,
    budget: Mutex<SignBudget>,
    audit: Option<AuditLog>,
}

impl Keystore {
    /// Persistent identity in `dir`, created on first use.
    pub fn open(dir: &str) -> Result<Self, KeystoreError> {
        let dir = Path::new(dir);
        let key = Ed25519Key::load_or_create(&dir.join(KEY_FILE))?;
        let mut ks = Self::with_backend(Box::new(key));
        ks.audit = Some(AuditLog { path: dir.join(AUDIT_FILE) });
        Ok(ks)
    }

    /// In-memory identity without an audit trail.
    pub fn ephemeral() -> Result<Self, KeystoreError> {
        Ok(Self::with_backend(Box::new(Ed25519Key::generate()?)))
    }

    /// Identity backed by `backend`.
    pub fn with_backend(backend: Box<dyn KeyBackend>) -> Self {
        Self { backend, budget: Mutex::new(SignBudget::full()), audit: None }
    }

    /// Public key.
    pub fn public_key(&self) -> PublicKey {
        self.backend.public_key()
    }

    /// Sign `msg`. Audit failures are logged, never fatal.
    pub fn sign(&self, msg: &[u8]) -> Result<Signature, KeystoreError> {
        let allowed = self.budget.lock().map(|mut b| b.take()).unwrap_or(false);
        if !allowed {
            return Err(KeystoreError::RateLimited);
        }
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.record(&self.public_key(), msg) {
                warn!(error = %e, path = %audit.path.display(), "signing audit not written");
            }
        }
        self.backend.sign(msg)
    }
}

/// Check an Ed25519 signature by `pk` over `msg`.
pub fn verify_pubkey_bytes(pk: &PublicKey, msg: &[u8], sig: &Signature) -> Result<(), KeystoreError> {
    if sig.0.len() != 64 {
        return Err(KeystoreError::BadSignature);
    }
    UnparsedPublicKey::new(&ED25519, &pk.0)
        .verify(msg, &sig.0)
        .map_err(|_| KeystoreError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ledger::signing::tx_signing_bytes, types::H256};

    #[test]
    fn signatures_verify_only_for_the_signed_bytes() {
        let ks = Keystore::ephemeral().unwrap();
        let msg = tx_signing_bytes(&H256::digest(b"tx"));
        let sig = ks.sign(&msg).unwrap();
        assert!(verify_pubkey_bytes(&ks.public_key(), &msg, &sig).is_ok());
        assert!(verify_pubkey_bytes(&ks.public_key(), b"other", &sig).is_err());
        assert!(verify_pubkey_bytes(&ks.public_key(), &msg, &Signature(vec![0; 12])).is_err());
    }

    #[test]
    fn persistent_identity_survives_reopen_and_audits_by_purpose() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let first = Keystore::open(&path).unwrap();
        first.sign(&tx_signing_bytes(&H256::digest(b"tx"))).unwrap();
        let again = Keystore::open(&path).unwrap();
        assert_eq!(first.public_key(), again.public_key());

        let audit = fs::read_to_string(dir.path().join(AUDIT_FILE)).unwrap();
        let line: serde_json::Value = serde_json::from_str(audit.lines().next().unwrap()).unwrap();
        assert_eq!(line["purpose"], "transaction");
        assert_eq!(line["key"], hex::encode(first.public_key().0));
    }

    #[test]
    fn budget_runs_dry_then_refills() {
        let later = Instant::now() + std::time::Duration::from_secs(1);
        let mut budget = SignBudget { tokens: 1.0, refilled: later };
        assert!(budget.take());
        assert!(!budget.take());
        budget.refilled = Instant::now() - std::time::Duration::from_millis(10);
        assert!(budget.take());
    }
}
