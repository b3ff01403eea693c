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

#![allow(dead_code)]

use ledgerflow::core::{
    config::FlowConfig,
    ledger::states::{ContractState, MessageState, StateAndRef, TransactionState},
    notary::router::type_index,
    oracle::fact_source::StaticFactSource,
    security::keystore::Keystore,
    types::{LinearId, Party, StateRef, H256},
};
use ledgerflow::networking::cluster::{ClusterBuilder, LocalCluster};
use std::sync::Arc;

pub fn prices(quotes: &[(&str, f64)]) -> Arc<StaticFactSource> {
    let source = StaticFactSource::new();
    for (symbol, price) in quotes {
        source.set_price(symbol, *price);
    }
    Arc::new(source)
}

pub fn builder(parties: &[&str], notaries: usize, quotes: &[(&str, f64)]) -> ClusterBuilder {
    let mut b = ClusterBuilder::new()
        .notaries(notaries)
        .oracle("Oracle", prices(quotes))
        .flows(FlowConfig { session_timeout_ms: 5_000, channel_capacity: 64, redelivery_interval_ms: 60_000 });
    for p in parties {
        b = b.party(p);
    }
    b
}

pub fn cluster(parties: &[&str], notaries: usize, quotes: &[(&str, f64)]) -> LocalCluster {
    builder(parties, notaries, quotes).start().unwrap()
}

pub fn identity(name: &str) -> (Keystore, Party) {
    let ks = Keystore::ephemeral().unwrap();
    let party = Party::new(name, ks.public_key());
    (ks, party)
}

/// Two message types that route to different notaries among `count`.
pub fn kinds_on_distinct_notaries(count: usize) -> (String, String) {
    let candidates = ["POST", "mail", "memo", "note", "fax", "telex", "sms", "letter"];
    for a in candidates {
        for b in candidates {
            if type_index(a, count) != type_index(b, count) {
                return (a.to_string(), b.to_string());
            }
        }
    }
    panic!("no two kinds route apart");
}

pub fn message_ref(sender: &Party, recipient: &Party, kind: &str, notary: &Party, seed: &[u8]) -> StateAndRef {
    StateAndRef {
        state: TransactionState {
            data: ContractState::Message(MessageState {
                sender: sender.clone(),
                recipient: recipient.clone(),
                contents: "hi".to_string(),
                kind: kind.to_string(),
                linear_id: LinearId::new(),
            }),
            notary: notary.clone(),
        },
        reference: StateRef { tx_id: H256::digest(seed), index: 0 },
    }
}
