#![forbid(unsafe_code)]

//! Signing identities.

pub mod keystore;
