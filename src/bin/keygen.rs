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

//! Provision every identity a network config names under its data directory.
//!
//! `keygen [config.toml]` creates `<data_dir>/<name>/identity.key` for each party, notary and
//! the oracle (existing keys are kept) and prints one JSON line per identity.

use anyhow::{bail, Context, Result};
use ledgerflow::core::config::{load_config, NodeConfig};
use ledgerflow::core::security::keystore::Keystore;
use std::path::Path;

fn main() -> Result<()> {
    let cfg = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path)).with_context(|| format!("loading {path}"))?,
        None => NodeConfig::default(),
    };
    let data_dir = match cfg.node.data_dir.as_str() {
        "" => "data",
        dir => dir,
    };
    if cfg.network.parties.is_empty() {
        bail!("no parties configured");
    }

    for name in cfg.network.identities() {
        let home = Path::new(data_dir).join(&name);
        std::fs::create_dir_all(&home).with_context(|| format!("creating {}", home.display()))?;
        let keystore = Keystore::open(&home.to_string_lossy())?;
        let line = serde_json::json!({
            "name": name,
            "owning_key": hex::encode(keystore.public_key().0),
            "dir": home.display().to_string(),
        });
        println!("{line}");
    }
    Ok(())
}
