#![forbid(unsafe_code)]

//! Persistence: sled storage, the vault, and the message query repository.

pub mod persistent_state;
pub mod repository;
pub mod vault;
