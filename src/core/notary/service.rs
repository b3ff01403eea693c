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

//! Uniqueness notary: the single arbiter of whether a state is still unspent.
//!
//! Each notary keeps a sled tree `consumed: StateRef -> consuming tx id`. A notarisation
//! request checks and records all of its inputs inside one sled transaction, so among any
//! number of concurrently racing transactions exactly one can consume a given input.
//! Re-notarising the same transaction is idempotent.

use crate::core::{
    ledger::{
        signing::uniqueness_signing_bytes,
        transaction::{SignatureScope, TransactionSignature},
    },
    security::keystore::{verify_pubkey_bytes, Keystore},
    state::persistent_state::{PersistentState, StateError},
    types::{Party, Signature, StateRef, H256},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// An input that was already consumed by another transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConflict {
    /// The contested state.
    pub state: StateRef,
    /// The transaction that consumed it first.
    pub consumed_by: H256,
}

/// Notary errors.
#[derive(Debug, Error)]
pub enum NotaryError {
    /// Inputs already consumed by another transaction.
    #[error("{} input(s) already consumed", .0.len())]
    Conflict(Vec<StateConflict>),
    /// The request was addressed to another notary.
    #[error("request addressed to {requested}, this notary is {actual}")]
    WrongNotary {
        /// Name the request asked for.
        requested: String,
        /// This notary's name.
        actual: String,
    },
    /// No notary in the pool carries this name.
    #[error("unknown notary {0}")]
    UnknownNotary(String),
    /// The consumed-state store failed.
    #[error("storage")]
    Storage,
    /// The certificate could not be signed.
    #[error("signing")]
    Signing,
}

impl From<StateError> for NotaryError {
    fn from(_: StateError) -> Self {
        NotaryError::Storage
    }
}

/// What a notary is asked to commit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotarisationRequest {
    /// Transaction being committed.
    pub tx_id: H256,
    /// States it consumes.
    pub inputs: Vec<StateRef>,
    /// Notary the transaction names.
    pub notary: Party,
}

/// Proof that none of a transaction's inputs were consumed by any other transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessCertificate {
    /// Committed transaction.
    pub tx_id: H256,
    /// Issuing notary.
    pub notary: Party,
    /// Notary signature over the uniqueness bytes.
    pub signature: Signature,
}

impl UniquenessCertificate {
    /// Check the notary's signature.
    pub fn verify(&self) -> bool {
        let msg = uniqueness_signing_bytes(&self.tx_id, &self.notary.owning_key);
        verify_pubkey_bytes(&self.notary.owning_key, &msg, &self.signature).is_ok()
    }

    /// The certificate as a transaction signature.
    pub fn to_signature(&self) -> TransactionSignature {
        TransactionSignature {
            by: self.notary.owning_key,
            signature: self.signature.clone(),
            scope: SignatureScope::Uniqueness,
        }
    }
}

/// One notary authority.
pub struct NotaryService {
    identity: Party,
    keystore: Keystore,
    consumed: sled::Tree,
}

impl NotaryService {
    /// Notary named `name` signing with `keystore`, logging consumption into `store`.
    pub fn new(name: &str, keystore: Keystore, store: &PersistentState) -> Result<Self, NotaryError> {
        let identity = Party::new(name, keystore.public_key());
        let consumed = store.tree(&format!("notary/{name}/consumed"))?;
        Ok(Self { identity, keystore, consumed })
    }

    /// This notary's identity.
    pub fn identity(&self) -> &Party {
        &self.identity
    }

    /// Consuming transaction of `state`, if any.
    pub fn consumed_by(&self, state: &StateRef) -> Result<Option<H256>, NotaryError> {
        let v = PersistentState::get(&self.consumed, &state.key_bytes())?;
        Ok(v.and_then(|b| <[u8; 32]>::try_from(b.as_slice()).ok()).map(H256::from_bytes))
    }

    /// Check and record all inputs atomically; sign on success.
    pub fn notarise(&self, req: &NotarisationRequest) -> Result<UniquenessCertificate, NotaryError> {
        if req.notary != self.identity {
            return Err(NotaryError::WrongNotary {
                requested: req.notary.name.clone(),
                actual: self.identity.name.clone(),
            });
        }

        let tx_id = req.tx_id;
        let res: Result<(), TransactionError<NotaryError>> = self.consumed.transaction(|t| {
            let mut conflicts = Vec::new();
            for input in req.inputs.iter() {
                if let Some(prev) = t.get(input.key_bytes())? {
                    if prev.as_ref() != tx_id.as_bytes() {
                        let consumed_by = <[u8; 32]>::try_from(prev.as_ref())
                            .map(H256::from_bytes)
                            .unwrap_or(H256::ZERO);
                        conflicts.push(StateConflict { state: *input, consumed_by });
                    }
                }
            }
            if !conflicts.is_empty() {
                return Err(ConflictableTransactionError::Abort(NotaryError::Conflict(conflicts)));
            }
            for input in req.inputs.iter() {
                t.insert(&input.key_bytes()[..], &tx_id.as_bytes()[..])?;
            }
            Ok(())
        });

        match res {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => {
                warn!(notary = %self.identity, tx_id = %tx_id, error = %e, "notarisation refused");
                return Err(e);
            }
            Err(TransactionError::Storage(_)) => return Err(NotaryError::Storage),
        }

        let msg = uniqueness_signing_bytes(&tx_id, &self.identity.owning_key);
        let signature = self.keystore.sign(&msg).map_err(|_| NotaryError::Signing)?;
        info!(notary = %self.identity, tx_id = %tx_id, inputs = req.inputs.len(), "notarised");
        Ok(UniquenessCertificate { tx_id, notary: self.identity.clone(), signature })
    }
}

/// Client side of the notary interface.
#[async_trait]
pub trait NotaryClient: Send + Sync {
    /// Submit and wait for a certificate or a conflict.
    async fn notarise(&self, req: NotarisationRequest) -> Result<UniquenessCertificate, NotaryError>;
}

/// In-process notaries addressed by name.
#[derive(Clone, Default)]
pub struct LocalNotaryPool {
    services: BTreeMap<String, Arc<NotaryService>>,
}

impl LocalNotaryPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notary.
    pub fn register(&mut self, service: Arc<NotaryService>) {
        self.services.insert(service.identity().name.clone(), service);
    }

    /// Registered notary by name.
    pub fn get(&self, name: &str) -> Option<&Arc<NotaryService>> {
        self.services.get(name)
    }
}

#[async_trait]
impl NotaryClient for LocalNotaryPool {
    async fn notarise(&self, req: NotarisationRequest) -> Result<UniquenessCertificate, NotaryError> {
        let service = self
            .services
            .get(&req.notary.name)
            .cloned()
            .ok_or_else(|| NotaryError::UnknownNotary(req.notary.name.clone()))?;
        // sled commits block; keep them off the async workers.
        tokio::task::spawn_blocking(move || service.notarise(&req))
            .await
            .map_err(|_| NotaryError::Storage)?
    }
}
