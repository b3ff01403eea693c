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

//! Prometheus counters shared by the nodes of one process.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A collector could not be created or registered.
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Workflow runs currently in progress.
    pub flows_active: IntGauge,
    /// Workflow runs started.
    pub flows_started_total: IntCounter,
    /// Workflow runs that committed.
    pub flows_completed_total: IntCounter,
    /// Workflow runs that aborted.
    pub flows_failed_total: IntCounter,

    /// Counterparty signatures collected.
    pub signatures_collected_total: IntCounter,
    /// Uniqueness certificates obtained.
    pub notarisations_total: IntCounter,
    /// Notarisations refused because an input was already consumed.
    pub double_spends_total: IntCounter,
    /// Attestations refused by the oracle.
    pub oracle_rejections_total: IntCounter,
    /// Output states recorded into the local vault.
    pub states_recorded_total: IntCounter,
}

fn counter(name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    IntCounter::new(name, help).map_err(|_| MetricsError::Prom)
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let flows_active = IntGauge::new("ledgerflow_flows_active", "Workflow runs in progress")
            .map_err(|_| MetricsError::Prom)?;
        let flows_started_total = counter("ledgerflow_flows_started_total", "Workflow runs started")?;
        let flows_completed_total =
            counter("ledgerflow_flows_completed_total", "Workflow runs committed")?;
        let flows_failed_total = counter("ledgerflow_flows_failed_total", "Workflow runs aborted")?;
        let signatures_collected_total = counter(
            "ledgerflow_signatures_collected_total",
            "Counterparty signatures collected",
        )?;
        let notarisations_total =
            counter("ledgerflow_notarisations_total", "Uniqueness certificates obtained")?;
        let double_spends_total =
            counter("ledgerflow_double_spends_total", "Notarisations refused on conflict")?;
        let oracle_rejections_total =
            counter("ledgerflow_oracle_rejections_total", "Attestations refused by the oracle")?;
        let states_recorded_total =
            counter("ledgerflow_states_recorded_total", "Output states recorded in the vault")?;

        registry
            .register(Box::new(flows_active.clone()))
            .map_err(|_| MetricsError::Prom)?;
        for c in [
            &flows_started_total,
            &flows_completed_total,
            &flows_failed_total,
            &signatures_collected_total,
            &notarisations_total,
            &double_spends_total,
            &oracle_rejections_total,
            &states_recorded_total,
        ] {
            registry.register(Box::new(c.clone())).map_err(|_| MetricsError::Prom)?;
        }

        Ok(Self {
            registry,
            flows_active,
            flows_started_total,
            flows_completed_total,
            flows_failed_total,
            signatures_collected_total,
            notarisations_total,
            double_spends_total,
            oracle_rejections_total,
            states_recorded_total,
        })
    }
}
