#![forbid(unsafe_code)]

//! Ledger model: states, transactions, contracts, filtered views.

pub mod builder;
pub mod contract;
pub mod filtered;
pub mod merkle;
pub mod signing;
pub mod states;
pub mod transaction;
