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

//! Point-to-point sessions between parties.
//!
//! A session is an ordered, reliable, bidirectional byte channel scoped to one workflow run.
//! Payloads travel in canonical encoding; every receive is bounded by the session timeout.

use crate::core::types::{decode_canonical_limited, encode_canonical, Party, MAX_PAYLOAD_BYTES};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Which responder an inbound session is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// Counterparty signature collection.
    SignTransaction,
    /// Finalised transaction broadcast.
    Finality,
    /// Filtered-view attestation by the oracle.
    OracleAttestation,
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer has no registered inbox.
    #[error("party {0} is not reachable")]
    Unreachable(String),
    /// The peer did not answer in time.
    #[error("timed out waiting for {0}")]
    Timeout(String),
    /// The peer dropped the session.
    #[error("session with {0} closed")]
    Closed(String),
    /// A frame could not be encoded or decoded.
    #[error("codec")]
    Codec,
}

/// One end of a session.
pub struct Session {
    id: u64,
    peer: Party,
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
    timeout: Duration,
}

impl Session {
    /// Session id (same on both ends).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Counterparty.
    pub fn peer(&self) -> &Party {
        &self.peer
    }

    /// `Send(sessionId, payload)`.
    pub async fn send<T: Serialize>(&self, msg: &T) -> Result<(), TransportError> {
        let bytes = encode_canonical(msg).map_err(|_| TransportError::Codec)?;
        self.tx
            .send(bytes)
            .await
            .map_err(|_| TransportError::Closed(self.peer.name.clone()))
    }

    /// `Receive(sessionId) -> payload`.
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T, TransportError> {
        let bytes = match tokio::time::timeout(self.timeout, self.rx.recv()).await {
            Err(_) => return Err(TransportError::Timeout(self.peer.name.clone())),
            Ok(None) => return Err(TransportError::Closed(self.peer.name.clone())),
            Ok(Some(b)) => b,
        };
        decode_canonical_limited(&bytes, MAX_PAYLOAD_BYTES).map_err(|_| TransportError::Codec)
    }

    /// Send then wait for the reply.
    pub async fn send_and_receive<T: Serialize, R: DeserializeOwned>(
        &mut self,
        msg: &T,
    ) -> Result<R, TransportError> {
        self.send(msg).await?;
        self.receive().await
    }
}

/// A session opened towards this node.
pub struct IncomingSession {
    /// Responder to run.
    pub protocol: Protocol,
    /// The responder's end.
    pub session: Session,
}

/// Opens sessions to other parties.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a session from `from` to `to` for `protocol`.
    async fn open(&self, from: &Party, to: &Party, protocol: Protocol) -> Result<Session, TransportError>;
}

/// In-process transport: one inbox per registered party.
pub struct LocalNetwork {
    inboxes: RwLock<BTreeMap<String, mpsc::Sender<IncomingSession>>>,
    capacity: usize,
    timeout: Duration,
    next_id: AtomicU64,
}

impl LocalNetwork {
    /// Network with per-channel `capacity` and per-receive `timeout`.
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self {
            inboxes: RwLock::new(BTreeMap::new()),
            capacity: capacity.max(1),
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `party` and return its inbox of inbound sessions.
    pub fn register(&self, party: &Party) -> mpsc::Receiver<IncomingSession> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.inboxes_mut().insert(party.name.clone(), tx);
        rx
    }

    /// Drop `party`'s inbox; later opens fail with `Unreachable`.
    pub fn unregister(&self, party: &Party) {
        self.inboxes_mut().remove(&party.name);
    }

    fn inbox(&self, name: &str) -> Option<mpsc::Sender<IncomingSession>> {
        self.inboxes_ref().get(name).cloned()
    }

    // A panic elsewhere cannot leave the map half-updated, so a poisoned lock is taken over.
    fn inboxes_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, mpsc::Sender<IncomingSession>>> {
        self.inboxes.write().unwrap_or_else(|poisoned| {
            warn!("inbox registry lock poisoned; continuing with its contents");
            poisoned.into_inner()
        })
    }

    fn inboxes_ref(&self) -> RwLockReadGuard<'_, BTreeMap<String, mpsc::Sender<IncomingSession>>> {
        self.inboxes.read().unwrap_or_else(|poisoned| {
            warn!("inbox registry lock poisoned; continuing with its contents");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    async fn open(&self, from: &Party, to: &Party, protocol: Protocol) -> Result<Session, TransportError> {
        let inbox = self.inbox(&to.name).ok_or_else(|| TransportError::Unreachable(to.name.clone()))?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (a_tx, b_rx) = mpsc::channel(self.capacity);
        let (b_tx, a_rx) = mpsc::channel(self.capacity);

        let ours = Session { id, peer: to.clone(), tx: a_tx, rx: a_rx, timeout: self.timeout };
        let theirs = Session { id, peer: from.clone(), tx: b_tx, rx: b_rx, timeout: self.timeout };
        inbox
            .send(IncomingSession { protocol, session: theirs })
            .await
            .map_err(|_| TransportError::Unreachable(to.name.clone()))?;
        debug!(session = id, from = %from, to = %to, ?protocol, "session opened");
        Ok(ours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PublicKey;

    fn party(name: &str, b: u8) -> Party {
        Party::new(name, PublicKey([b; 32]))
    }

    #[tokio::test]
    async fn ordered_round_trip() {
        let net = LocalNetwork::new(8, Duration::from_secs(1));
        let (a, b) = (party("A", 1), party("B", 2));
        let mut inbox = net.register(&b);

        let mut ours = net.open(&a, &b, Protocol::Finality).await.unwrap();
        let mut incoming = inbox.recv().await.unwrap();
        assert_eq!(incoming.protocol, Protocol::Finality);
        assert_eq!(incoming.session.peer().name, "A");

        ours.send(&1u32).await.unwrap();
        ours.send(&2u32).await.unwrap();
        assert_eq!(incoming.session.receive::<u32>().await.unwrap(), 1);
        assert_eq!(incoming.session.receive::<u32>().await.unwrap(), 2);
        incoming.session.send(&"ok".to_string()).await.unwrap();
        assert_eq!(ours.receive::<String>().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn unknown_party_is_unreachable() {
        let net = LocalNetwork::new(8, Duration::from_secs(1));
        let err = net.open(&party("A", 1), &party("Z", 9), Protocol::SignTransaction).await;
        assert!(matches!(err, Err(TransportError::Unreachable(_))));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let net = LocalNetwork::new(8, Duration::from_millis(50));
        let b = party("B", 2);
        let _inbox = net.register(&b);
        let mut ours = net.open(&party("A", 1), &b, Protocol::SignTransaction).await.unwrap();
        assert!(matches!(ours.receive::<u32>().await, Err(TransportError::Timeout(_))));
    }

    #[tokio::test]
    async fn registry_survives_a_panicking_writer() {
        let net = std::sync::Arc::new(LocalNetwork::new(8, Duration::from_secs(1)));
        let held = std::sync::Arc::clone(&net);
        let crashed = std::thread::spawn(move || {
            let _guard = held.inboxes.write();
            panic!("writer died holding the registry");
        })
        .join();
        assert!(crashed.is_err());
        assert!(net.inboxes.is_poisoned());

        let (a, b) = (party("A", 1), party("B", 2));
        let mut inbox = net.register(&b);
        net.open(&a, &b, Protocol::Finality).await.unwrap();
        assert_eq!(inbox.recv().await.unwrap().protocol, Protocol::Finality);

        net.unregister(&b);
        assert!(matches!(net.open(&a, &b, Protocol::Finality).await, Err(TransportError::Unreachable(_))));
    }
}
