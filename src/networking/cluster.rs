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

//! In-process network: parties, notaries and the oracle wired together explicitly.
//!
//! Every node receives its collaborators at construction: its keystore and database, the shared
//! network map, the transport, the notary pool and a fact source. Nothing is looked up
//! ambiently.

use crate::{
    core::{
        config::{FlowConfig, NodeConfig},
        flows::{FlowError, Node, NodeServices},
        notary::{
            router::NOTARY_NAME_PREFIX,
            service::{LocalNotaryPool, NotaryError, NotaryService},
        },
        oracle::{fact_source::FactSource, validator::PriceOracle},
        security::keystore::{Keystore, KeystoreError},
        state::persistent_state::{PersistentState, StateError},
        types::Party,
    },
    monitoring::metrics::{Metrics, MetricsError},
    networking::{
        directory::{DirectoryError, NetworkMap},
        transport::LocalNetwork,
    },
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

/// Cluster start-up errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The cluster description is inconsistent.
    #[error("config: {0}")]
    Config(&'static str),
    /// The network map could not be built.
    #[error("directory: {0}")]
    Directory(#[from] DirectoryError),
    /// A node database could not be opened.
    #[error("state: {0}")]
    State(#[from] StateError),
    /// An identity could not be loaded.
    #[error("keystore: {0}")]
    Keystore(#[from] KeystoreError),
    /// A notary could not be started.
    #[error("notary: {0}")]
    Notary(#[from] NotaryError),
    /// A node could not be started.
    #[error("flow: {0}")]
    Flow(#[from] FlowError),
    /// Metrics could not be registered.
    #[error("metrics: {0}")]
    Metrics(#[from] MetricsError),
}

/// Describes a cluster before it starts.
pub struct ClusterBuilder {
    parties: Vec<String>,
    notaries: usize,
    oracle: Option<(String, Arc<dyn FactSource>)>,
    fact_sources: BTreeMap<String, Arc<dyn FactSource>>,
    flows: FlowConfig,
    data_dir: Option<PathBuf>,
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterBuilder {
    /// No parties, one notary, in-memory stores.
    pub fn new() -> Self {
        Self {
            parties: Vec::new(),
            notaries: 1,
            oracle: None,
            fact_sources: BTreeMap::new(),
            flows: FlowConfig::default(),
            data_dir: None,
        }
    }

    /// Builder from the `[network]`, `[flows]` and `[node]` sections.
    pub fn from_config(cfg: &NodeConfig, oracle_source: Arc<dyn FactSource>) -> Self {
        let mut b = Self::new()
            .notaries(cfg.network.notaries)
            .oracle(&cfg.network.oracle_name, oracle_source)
            .flows(cfg.flows.clone());
        for name in cfg.network.parties.iter() {
            b = b.party(name);
        }
        if !cfg.node.data_dir.is_empty() {
            b = b.data_dir(Path::new(&cfg.node.data_dir));
        }
        b
    }

    /// Add an ordinary party.
    pub fn party(mut self, name: &str) -> Self {
        self.parties.push(name.to_string());
        self
    }

    /// Number of notaries, named `Notary-0 ..`.
    pub fn notaries(mut self, n: usize) -> Self {
        self.notaries = n;
        self
    }

    /// Add the oracle with its fact source. Parties without their own source share it.
    pub fn oracle(mut self, name: &str, source: Arc<dyn FactSource>) -> Self {
        self.oracle = Some((name.to_string(), source));
        self
    }

    /// Give party `name` its own view of prices.
    pub fn fact_source_for(mut self, name: &str, source: Arc<dyn FactSource>) -> Self {
        self.fact_sources.insert(name.to_string(), source);
        self
    }

    /// Session tuning.
    pub fn flows(mut self, flows: FlowConfig) -> Self {
        self.flows = flows;
        self
    }

    /// Persist databases and keys under `dir/<name>`.
    pub fn data_dir(mut self, dir: &Path) -> Self {
        self.data_dir = Some(dir.to_path_buf());
        self
    }

    fn open_identity(&self, name: &str) -> Result<(Keystore, PersistentState), ClusterError> {
        match &self.data_dir {
            None => Ok((Keystore::ephemeral()?, PersistentState::temporary()?)),
            Some(dir) => {
                let home = dir.join(name);
                std::fs::create_dir_all(&home).map_err(|_| ClusterError::Config("cannot create data dir"))?;
                let home_str = home.to_string_lossy().to_string();
                let db = home.join("db").to_string_lossy().to_string();
                Ok((Keystore::open(&home_str)?, PersistentState::open(&db)?))
            }
        }
    }

    /// Create every identity, register every party and spawn one driver and one redelivery
    /// loop per node.
    /// Must run inside a tokio runtime.
    pub fn start(self) -> Result<LocalCluster, ClusterError> {
        if self.parties.is_empty() {
            return Err(ClusterError::Config("at least one party is required"));
        }
        let metrics = Arc::new(Metrics::new()?);
        let network = Arc::new(LocalNetwork::new(self.flows.channel_capacity, self.flows.session_timeout()));
        let mut map = NetworkMap::new();

        let mut pool = LocalNotaryPool::new();
        let mut notary_services = BTreeMap::new();
        for i in 0..self.notaries {
            let name = format!("{NOTARY_NAME_PREFIX}{i}");
            let (keystore, store) = self.open_identity(&name)?;
            let service = Arc::new(NotaryService::new(&name, keystore, &store)?);
            map.add_notary(service.identity().clone())?;
            pool.register(Arc::clone(&service));
            notary_services.insert(name, service);
        }

        let mut identities: Vec<(String, Keystore, PersistentState)> = Vec::new();
        for name in self.parties.iter() {
            let (keystore, store) = self.open_identity(name)?;
            map.add_party(Party::new(name.as_str(), keystore.public_key()))?;
            identities.push((name.clone(), keystore, store));
        }
        let mut oracle_identity = None;
        if let Some((name, _)) = &self.oracle {
            let (keystore, store) = self.open_identity(name)?;
            map.set_oracle(Party::new(name.as_str(), keystore.public_key()))?;
            oracle_identity = Some((name.clone(), keystore, store));
        }

        let map = Arc::new(map);
        let pool = Arc::new(pool);
        let shared_source = self.oracle.as_ref().map(|(_, s)| Arc::clone(s));

        let mut nodes = BTreeMap::new();
        let mut drivers = Vec::new();
        let all = identities.into_iter().map(|i| (i, false)).chain(oracle_identity.map(|i| (i, true)));
        for ((name, keystore, store), is_oracle) in all {
            let keystore = Arc::new(keystore);
            let fact_source = self
                .fact_sources
                .get(&name)
                .cloned()
                .or_else(|| shared_source.clone())
                .ok_or(ClusterError::Config("no fact source configured"))?;
            let oracle = if is_oracle {
                let identity = map.party(&name)?;
                Some(Arc::new(PriceOracle::new(identity, Arc::clone(&keystore), Arc::clone(&fact_source))))
            } else {
                None
            };
            let node = Node::new(
                &name,
                NodeServices {
                    keystore,
                    store,
                    network_map: Arc::clone(&map),
                    transport: network.clone(),
                    notaries: pool.clone(),
                    fact_source,
                    oracle,
                    metrics: Arc::clone(&metrics),
                },
            )?;
            let inbox = network.register(node.identity());
            drivers.push(node.spawn_driver(inbox));
            drivers.push(node.spawn_redelivery(self.flows.redelivery_interval()));
            nodes.insert(name, node);
        }

        info!(parties = self.parties.len(), notaries = self.notaries, oracle = self.oracle.is_some(), "cluster started");
        Ok(LocalCluster { network, map, nodes, notaries: notary_services, metrics, drivers })
    }
}

/// A running in-process network.
pub struct LocalCluster {
    network: Arc<LocalNetwork>,
    map: Arc<NetworkMap>,
    nodes: BTreeMap<String, Arc<Node>>,
    notaries: BTreeMap<String, Arc<NotaryService>>,
    metrics: Arc<Metrics>,
    drivers: Vec<JoinHandle<()>>,
}

impl LocalCluster {
    /// Node of party `name`.
    pub fn node(&self, name: &str) -> Result<Arc<Node>, ClusterError> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::Directory(DirectoryError::UnknownParty(name.to_string())))
    }

    /// Notary service by name.
    pub fn notary(&self, name: &str) -> Option<&Arc<NotaryService>> {
        self.notaries.get(name)
    }

    /// Shared network map.
    pub fn network_map(&self) -> &NetworkMap {
        &self.map
    }

    /// Shared transport.
    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }

    /// Shared metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Stop every driver and redelivery loop.
    pub fn shutdown(self) {
        for d in self.drivers {
            d.abort();
        }
    }
}
