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

//! Transaction coordination workflows.
//!
//! A [`Node`] is one party's view of the network: its signing key, vault, checkpoint tree and
//! explicit handles to the transport, the notaries, the fact source and the network map. Every
//! workflow is an `async` method on `Node` that suspends only at network round-trips and at the
//! fact lookup. Inbound sessions are dispatched by [`Node::spawn_driver`] to the responders.

pub mod checkpoint;
pub mod finality;
pub mod gift;
pub mod messages;
pub mod notary_change;
pub mod oracle;
pub mod outbox;
pub mod responder;
pub mod signatures;
pub mod wire;

use crate::{
    core::{
        ledger::{
            builder::BuildError,
            contract::ContractError,
            signing::tx_signing_bytes,
            transaction::{
                Proposal, ResolutionError, SignatureError, SignatureScope, SignedTransaction,
                TransactionSignature,
            },
        },
        notary::{
            router::RoutingError,
            service::{NotaryClient, NotaryError, StateConflict},
        },
        oracle::{
            fact_source::FactSource,
            validator::{AttestationError, PriceOracle},
        },
        security::keystore::{Keystore, KeystoreError},
        state::{
            persistent_state::{PersistentState, StateError},
            repository::MessageRepository,
            vault::Vault,
        },
        types::{CodecError, Party},
    },
    monitoring::metrics::Metrics,
    networking::{
        directory::{DirectoryError, NetworkMap},
        transport::{IncomingSession, Transport, TransportError},
    },
};
use checkpoint::{Checkpoint, CheckpointStore};
use outbox::Outbox;
use std::sync::Arc;
use thiserror::Error;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Workflow failure taxonomy. Nothing is committed anywhere when a workflow returns an error
/// before its finality step.
#[derive(Debug, Error)]
pub enum FlowError {
    /// The proposal breaks a contract or structural rule.
    #[error("malformed proposal: {0}")]
    MalformedProposal(String),
    /// No notary carries the requested name.
    #[error("no notary registered as {0}")]
    NoMatchingNotary(String),
    /// The network has no notaries.
    #[error("no notary found")]
    NoNotaryFound,
    /// A counterparty refused to sign or record.
    #[error("{party} rejected the transaction: {reason}")]
    RejectedByCounterparty {
        /// Who refused.
        party: String,
        /// Their stated reason.
        reason: String,
    },
    /// The oracle refused to attest the price.
    #[error("invalid attestation: {0}")]
    InvalidAttestation(String),
    /// The oracle has no quote for the symbol.
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    /// The notary found inputs already consumed.
    #[error("double spend: {} input(s) already consumed", .0.len())]
    DoubleSpend(Vec<StateConflict>),
    /// A counterparty could not be reached before anything was committed. Safe to retry.
    #[error("party {0} unreachable")]
    UnreachableParty(String),
    /// The name is not in the network map.
    #[error("unknown party {0}")]
    UnknownParty(String),
    /// Signing or signature verification failed.
    #[error("signature: {0}")]
    Signature(String),
    /// Local storage failed.
    #[error("storage")]
    Storage,
    /// A message could not be encoded or decoded.
    #[error("codec")]
    Codec,
}

impl From<BuildError> for FlowError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Entropy => FlowError::Signature(e.to_string()),
            other => FlowError::MalformedProposal(other.to_string()),
        }
    }
}

impl From<ContractError> for FlowError {
    fn from(e: ContractError) -> Self {
        FlowError::MalformedProposal(e.to_string())
    }
}

impl From<ResolutionError> for FlowError {
    fn from(e: ResolutionError) -> Self {
        FlowError::MalformedProposal(e.to_string())
    }
}

impl From<RoutingError> for FlowError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::NoMatchingNotary(name) => FlowError::NoMatchingNotary(name),
            RoutingError::NoNotaryFound => FlowError::NoNotaryFound,
        }
    }
}

impl From<NotaryError> for FlowError {
    fn from(e: NotaryError) -> Self {
        match e {
            NotaryError::Conflict(c) => FlowError::DoubleSpend(c),
            NotaryError::UnknownNotary(name) => FlowError::NoMatchingNotary(name),
            NotaryError::WrongNotary { .. } => FlowError::MalformedProposal(e.to_string()),
            NotaryError::Storage => FlowError::Storage,
            NotaryError::Signing => FlowError::Signature(e.to_string()),
        }
    }
}

impl From<AttestationError> for FlowError {
    fn from(e: AttestationError) -> Self {
        match e {
            AttestationError::InvalidAttestation(m) => FlowError::InvalidAttestation(m),
            AttestationError::UnknownSubject(s) => FlowError::UnknownSubject(s),
            AttestationError::Unavailable(m) => FlowError::UnreachableParty(m),
            AttestationError::Signing => FlowError::Signature("oracle could not sign".into()),
        }
    }
}

impl From<TransportError> for FlowError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Unreachable(p) | TransportError::Timeout(p) | TransportError::Closed(p) => {
                FlowError::UnreachableParty(p)
            }
            TransportError::Codec => FlowError::Codec,
        }
    }
}

impl From<DirectoryError> for FlowError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::UnknownParty(name) => FlowError::UnknownParty(name),
            other => FlowError::UnknownParty(other.to_string()),
        }
    }
}

impl From<SignatureError> for FlowError {
    fn from(e: SignatureError) -> Self {
        FlowError::Signature(e.to_string())
    }
}

impl From<KeystoreError> for FlowError {
    fn from(e: KeystoreError) -> Self {
        FlowError::Signature(e.to_string())
    }
}

impl From<StateError> for FlowError {
    fn from(_: StateError) -> Self {
        FlowError::Storage
    }
}

impl From<CodecError> for FlowError {
    fn from(_: CodecError) -> Self {
        FlowError::Codec
    }
}

/// Collaborators a node is constructed with.
pub struct NodeServices {
    /// Signing identity.
    pub keystore: Arc<Keystore>,
    /// Local database (vault and checkpoints).
    pub store: PersistentState,
    /// Who is who.
    pub network_map: Arc<NetworkMap>,
    /// Session transport.
    pub transport: Arc<dyn Transport>,
    /// Notary interface.
    pub notaries: Arc<dyn NotaryClient>,
    /// Price lookups for gift proposals.
    pub fact_source: Arc<dyn FactSource>,
    /// Set on the oracle node only.
    pub oracle: Option<Arc<PriceOracle>>,
    /// Shared metrics.
    pub metrics: Arc<Metrics>,
}

/// One party's node.
pub struct Node {
    identity: Party,
    keystore: Arc<Keystore>,
    vault: Vault,
    repository: MessageRepository,
    checkpoints: CheckpointStore,
    outbox: Outbox,
    delivery: Mutex<()>,
    network_map: Arc<NetworkMap>,
    transport: Arc<dyn Transport>,
    notaries: Arc<dyn NotaryClient>,
    fact_source: Arc<dyn FactSource>,
    oracle: Option<Arc<PriceOracle>>,
    metrics: Arc<Metrics>,
}

impl Node {
    /// Node for the party `name`, whose key is the keystore's key.
    pub fn new(name: &str, services: NodeServices) -> Result<Arc<Self>, FlowError> {
        let identity = Party::new(name, services.keystore.public_key());
        let vault = Vault::open(&services.store)?;
        let checkpoints = CheckpointStore::open(&services.store)?;
        let outbox = Outbox::open(&services.store)?;
        let node = Arc::new(Self {
            identity,
            keystore: services.keystore,
            repository: MessageRepository::new(vault.clone()),
            vault,
            checkpoints,
            outbox,
            delivery: Mutex::new(()),
            network_map: services.network_map,
            transport: services.transport,
            notaries: services.notaries,
            fact_source: services.fact_source,
            oracle: services.oracle,
            metrics: services.metrics,
        });
        node.recover_interrupted()?;
        Ok(node)
    }

    /// This node's party.
    pub fn identity(&self) -> &Party {
        &self.identity
    }

    /// Local vault.
    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Message queries over the local vault.
    pub fn repository(&self) -> &MessageRepository {
        &self.repository
    }

    /// Checkpoint tree.
    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Deliveries owed to unreachable participants.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Network map.
    pub fn network_map(&self) -> &NetworkMap {
        &self.network_map
    }

    /// Metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Our signature over the whole transaction.
    pub(crate) fn sign_id(&self, stx: &SignedTransaction) -> Result<TransactionSignature, FlowError> {
        let signature = self.keystore.sign(&tx_signing_bytes(&stx.id))?;
        Ok(TransactionSignature { by: self.identity.owning_key, signature, scope: SignatureScope::Transaction })
    }

    /// Wrap a verified proposal with our signature.
    pub(crate) fn sign_proposal(&self, proposal: Proposal) -> Result<SignedTransaction, FlowError> {
        let unsigned = SignedTransaction::new(proposal, Vec::new())?;
        let sig = self.sign_id(&unsigned)?;
        Ok(unsigned.with_signature(sig))
    }

    /// Start a checkpointed run.
    pub(crate) fn begin(&self, flow: &str) -> Result<Checkpoint, FlowError> {
        let cp = self.checkpoints.begin(flow)?;
        self.metrics.flows_started_total.inc();
        self.metrics.flows_active.inc();
        info!(party = %self.identity, run = cp.run_id, flow, "flow started");
        Ok(cp)
    }

    /// Close a run, keeping the outcome.
    pub(crate) fn end<T>(&self, cp: Checkpoint, outcome: Result<T, FlowError>) -> Result<T, FlowError> {
        self.metrics.flows_active.dec();
        if let Err(e) = self.checkpoints.finish(&cp) {
            warn!(party = %self.identity, run = cp.run_id, error = %e, "could not clear checkpoint");
        }
        match &outcome {
            Ok(_) => {
                self.metrics.flows_completed_total.inc();
                info!(party = %self.identity, run = cp.run_id, flow = %cp.flow, "flow completed");
            }
            Err(e) => {
                self.metrics.flows_failed_total.inc();
                warn!(party = %self.identity, run = cp.run_id, flow = %cp.flow, step = ?cp.step, error = %e, "flow failed");
            }
        }
        outcome
    }

    /// Serve inbound sessions until the inbox closes. Each session runs in its own task.
    pub fn spawn_driver(self: &Arc<Self>, mut inbox: mpsc::Receiver<IncomingSession>) -> JoinHandle<()> {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(incoming) = inbox.recv().await {
                let node = Arc::clone(&node);
                tokio::spawn(async move {
                    let protocol = incoming.protocol;
                    let peer = incoming.session.peer().name.clone();
                    if let Err(e) = node.respond(incoming).await {
                        warn!(party = %node.identity, peer = %peer, ?protocol, error = %e, "responder failed");
                    }
                });
            }
            debug!(party = %node.identity, "inbox closed");
        })
    }
}
