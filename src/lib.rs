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

//! Ledgerflow - multi-party transaction coordination.
//!
//! This crate provides:
//! - A salted, Merkle-committed transaction model with filtered views for limited-trust parties
//! - Contract verification shared by the proposal builder and every signer
//! - Notary routing (default, by message type, by majority) and a sled-backed uniqueness notary
//! - Signature collection, oracle attestation and finality workflows with durable step cursors
//! - A vault with an indexed, spent-aware query path
//! - Monitoring via Prometheus metrics and structured logging

/// Core protocol primitives (types, ledger, notaries, oracle, state, workflows).
pub mod core;
/// Observability (metrics).
pub mod monitoring;
/// Party directory, session transport, in-process cluster.
pub mod networking;
