#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Networking: party directory, session transport, in-process cluster.

pub mod cluster;
pub mod directory;
pub mod transport;
