#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Core: ledger model, notaries, oracle, persistence and workflows.

pub mod config;
pub mod flows;
pub mod ledger;
pub mod notary;
pub mod oracle;
pub mod security;
pub mod state;
pub mod types;
