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

//! Ledgerflow demo node: boots an in-process network and runs the message and gift workflows.

use anyhow::{bail, Context, Result};
use ledgerflow::core::config::{load_config, NodeConfig};
use ledgerflow::core::oracle::fact_source::{FactSource, HttpFactSource, StaticFactSource};
use ledgerflow::networking::cluster::ClusterBuilder;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

fn env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn init_logging() {
    let builder = tracing_subscriber::fmt().with_target(false).with_level(true);
    let _ = if env("LEDGERFLOW_LOG_JSON", "0") == "1" {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

fn default_config() -> NodeConfig {
    let mut cfg = NodeConfig::default();
    cfg.oracle.static_prices.insert("acn".to_string(), 50.0);
    cfg
}

fn fact_source(cfg: &NodeConfig) -> Result<Arc<dyn FactSource>> {
    if let Some(url) = cfg.oracle.base_url.as_deref() {
        return Ok(Arc::new(HttpFactSource::new(url, cfg.oracle.request_timeout())?));
    }
    let source = StaticFactSource::new();
    for (symbol, price) in cfg.oracle.static_prices.iter() {
        source.set_price(symbol, *price);
    }
    Ok(Arc::new(source))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        built = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown"),
        target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown"),
        "ledgerflow starting"
    );

    let mut cfg = match std::env::var("LEDGERFLOW_CONFIG") {
        Ok(path) => load_config(Path::new(&path)).with_context(|| format!("loading {path}"))?,
        Err(_) => default_config(),
    };
    if let Ok(dir) = std::env::var("LEDGERFLOW_DATA_DIR") {
        cfg.node.data_dir = dir;
    }
    if cfg.network.parties.len() < 2 {
        bail!("the demo needs at least two parties");
    }

    let cluster = ClusterBuilder::from_config(&cfg, fact_source(&cfg)?).start()?;
    let (a_name, b_name) = (&cfg.network.parties[0], &cfg.network.parties[1]);
    let (a, b) = (cluster.node(a_name)?, cluster.node(b_name)?);

    for kind in ["POST", "mail"] {
        let stx = a.send_message(b_name, &format!("hello by {kind}"), kind).await?;
        info!(tx = %stx, notary = %stx.tx.notary, "message sent");
    }
    let replies = b.reply_to_messages().await?;
    info!(count = replies.len(), "replies committed");
    let unanswered = a.repository().find_all_new_by_sender_and_type(a.identity(), "POST")?;
    let answers = a.repository().find_all_new_by_sender(b.identity())?;
    info!(unanswered = unanswered.len(), answers = answers.len(), party = %a_name, "vault after replies");

    match a.delete_all_messages_from_party(b_name).await {
        Ok(stx) => info!(tx = %stx, "cleared replies"),
        Err(e) => warn!(error = %e, "nothing to clear"),
    }

    for symbol in cfg.oracle.static_prices.keys() {
        match a.give_away_stock(symbol, 100, b_name).await {
            Ok(stx) => info!(tx = %stx, symbol = %symbol, "gift committed"),
            Err(e) => warn!(symbol = %symbol, error = %e, "gift failed"),
        }
    }

    let m = cluster.metrics();
    info!(
        started = m.flows_started_total.get(),
        completed = m.flows_completed_total.get(),
        failed = m.flows_failed_total.get(),
        "done"
    );
    cluster.shutdown();
    Ok(())
}
