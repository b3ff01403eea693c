#![forbid(unsafe_code)]

//! Price oracle: external fact source and filtered-view attestation.

pub mod fact_source;
pub mod validator;
