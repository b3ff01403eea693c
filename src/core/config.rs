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

//! Node configuration (TOML).

use crate::core::notary::router::NOTARY_NAME_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Config loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("read config")]
    Read,
    /// The file is not valid TOML for this schema.
    #[error("parse config: {0}")]
    Parse(String),
    /// A value is out of range or inconsistent.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Node configuration root.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node settings.
    #[serde(default)]
    pub node: NodeSettings,
    /// Network membership.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Workflow tuning.
    #[serde(default)]
    pub flows: FlowConfig,
}

/// Node settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeSettings {
    /// Human-readable name.
    pub name: String,
    /// Data directory (db + keys). Empty means in-memory stores.
    #[serde(default)]
    pub data_dir: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self { name: "ledgerflow".to_string(), data_dir: String::new() }
    }
}

/// Parties and notaries in the network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Ordinary party names.
    pub parties: Vec<String>,
    /// Number of notaries, named `Notary-0 .. Notary-(n-1)`.
    pub notaries: usize,
    /// Oracle party name.
    #[serde(default = "default_oracle_name")]
    pub oracle_name: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            parties: vec!["PartyA".to_string(), "PartyB".to_string()],
            notaries: 3,
            oracle_name: default_oracle_name(),
        }
    }
}

impl NetworkConfig {
    /// Every identity the network needs: parties, then notaries, then the oracle.
    pub fn identities(&self) -> Vec<String> {
        let notaries = (0..self.notaries).map(|i| format!("{NOTARY_NAME_PREFIX}{i}"));
        self.parties.iter().cloned().chain(notaries).chain([self.oracle_name.clone()]).collect()
    }
}

fn default_oracle_name() -> String {
    "Oracle".to_string()
}

/// Fact source used by the oracle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Quote service base URL. When unset, `static_prices` is used.
    #[serde(default)]
    pub base_url: Option<String>,
    /// HTTP request timeout in milliseconds (0 = default 5000).
    #[serde(default)]
    pub request_timeout_ms: u64,
    /// Fixed prices by symbol.
    #[serde(default)]
    pub static_prices: BTreeMap<String, f64>,
}

impl OracleConfig {
    /// Effective request timeout.
    pub fn request_timeout(&self) -> Duration {
        match self.request_timeout_ms {
            0 => Duration::from_millis(5_000),
            ms => Duration::from_millis(ms),
        }
    }
}

/// Workflow tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Per-receive session timeout in milliseconds.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    /// Inbox capacity per node and per session.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// How often owed finality broadcasts are retried, in milliseconds.
    #[serde(default = "default_redelivery_interval_ms")]
    pub redelivery_interval_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: default_session_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            redelivery_interval_ms: default_redelivery_interval_ms(),
        }
    }
}

impl FlowConfig {
    /// Session timeout as a duration.
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Redelivery period as a duration.
    pub fn redelivery_interval(&self) -> Duration {
        Duration::from_millis(self.redelivery_interval_ms)
    }
}

fn default_session_timeout_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    64
}

fn default_redelivery_interval_ms() -> u64 {
    5_000
}

impl NodeConfig {
    /// Parse and validate TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: NodeConfig = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.network.parties.is_empty() {
            return Err(ConfigError::Invalid("network.parties is empty"));
        }
        if self.flows.session_timeout_ms == 0 {
            return Err(ConfigError::Invalid("flows.session_timeout_ms must be positive"));
        }
        if self.flows.channel_capacity == 0 {
            return Err(ConfigError::Invalid("flows.channel_capacity must be positive"));
        }
        if self.flows.redelivery_interval_ms == 0 {
            return Err(ConfigError::Invalid("flows.redelivery_interval_ms must be positive"));
        }
        Ok(())
    }
}

/// Load a config file.
pub fn load_config(path: &Path) -> Result<NodeConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|_| ConfigError::Read)?;
    NodeConfig::from_toml(&raw)
}
