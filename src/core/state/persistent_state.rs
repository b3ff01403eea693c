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

//! Persistent key-value storage on sled: named trees with atomic multi-key commits.

use crate::core::types::CodecError;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use thiserror::Error;

/// State errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// The database could not be opened.
    #[error("db open")]
    DbOpen,
    /// A read or write failed.
    #[error("db io")]
    DbIo,
    /// An atomic batch was aborted.
    #[error("tx conflict")]
    TxConflict,
    /// A stored value could not be decoded.
    #[error("codec")]
    Codec,
}

impl From<CodecError> for StateError {
    fn from(_: CodecError) -> Self {
        StateError::Codec
    }
}

impl From<sled::Error> for StateError {
    fn from(_: sled::Error) -> Self {
        StateError::DbIo
    }
}

/// State operation.
#[derive(Clone, Debug)]
pub enum KvOp {
    /// Put key/value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete key.
    Del { key: Vec<u8> },
}

/// Persistent store wrapper.
#[derive(Clone)]
pub struct PersistentState {
    db: sled::Db,
}

impl PersistentState {
    /// Open sled DB at path (directory).
    pub fn open(path: &str) -> Result<Self, StateError> {
        let db = sled::open(path).map_err(|_| StateError::DbOpen)?;
        Ok(Self { db })
    }

    /// Throwaway DB removed on drop.
    pub fn temporary() -> Result<Self, StateError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|_| StateError::DbOpen)?;
        Ok(Self { db })
    }

    /// Open (or create) a named tree.
    pub fn tree(&self, name: &str) -> Result<sled::Tree, StateError> {
        self.db.open_tree(name).map_err(|_| StateError::DbOpen)
    }

    /// Get value from a tree.
    pub fn get(tree: &sled::Tree, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let v = tree.get(key)?;
        Ok(v.map(|iv| iv.to_vec()))
    }

    /// Atomic commit of `ops` against one tree.
    pub fn commit_atomic(tree: &sled::Tree, ops: &[KvOp]) -> Result<(), StateError> {
        let res: Result<(), TransactionError<StateError>> = tree.transaction(|t| {
            for op in ops.iter() {
                match op {
                    KvOp::Put { key, value } => {
                        t.insert(key.as_slice(), value.as_slice())?;
                    }
                    KvOp::Del { key } => {
                        t.remove(key.as_slice())?;
                    }
                }
            }
            Ok::<(), ConflictableTransactionError<StateError>>(())
        });
        res.map_err(map_tx_error)
    }

    /// Monotonic id, unique for the lifetime of the DB. Not contiguous.
    pub fn generate_id(&self) -> Result<u64, StateError> {
        Ok(self.db.generate_id()?)
    }

    /// Flush to disk.
    pub fn flush(&self) -> Result<(), StateError> {
        self.db.flush()?;
        Ok(())
    }
}

/// Collapse a sled transaction error into [`StateError`].
pub fn map_tx_error(e: TransactionError<StateError>) -> StateError {
    match e {
        TransactionError::Abort(se) => se,
        TransactionError::Storage(_) => StateError::DbIo,
    }
}
