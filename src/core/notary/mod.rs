#![forbid(unsafe_code)]

//! Notary selection and the uniqueness service.

pub mod router;
pub mod service;
