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

//! External fact source: current stock prices.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Body the quote service returns for symbols it does not know.
const UNKNOWN_SYMBOL_BODY: &str = "Unknown symbol";

/// Current price of a symbol.
#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    /// Ticker symbol as requested.
    pub symbol: String,
    /// Company name.
    pub name: String,
    /// Primary exchange.
    pub exchange: String,
    /// Latest price.
    pub price: f64,
}

/// Fact source errors.
#[derive(Debug, Error)]
pub enum FactError {
    /// The source does not know the symbol.
    #[error("symbol {0} does not exist")]
    NotFound(String),
    /// Transport failure or unexpected status.
    #[error("quote request failed: {0}")]
    Http(String),
    /// The response body is not a quote.
    #[error("malformed quote: {0}")]
    Malformed(String),
}

/// Where current prices come from.
#[async_trait]
pub trait FactSource: Send + Sync {
    /// Fetch the current quote for `symbol`.
    async fn current_price(&self, symbol: &str) -> Result<Quote, FactError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody {
    company_name: String,
    primary_exchange: String,
    latest_price: f64,
}

/// Quote service over HTTPS: `GET <base_url>/stock/<symbol>/quote`.
#[derive(Clone)]
pub struct HttpFactSource {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpFactSource {
    /// Client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FactError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FactError::Http(e.to_string()))?;
        let base_url = reqwest::Url::parse(base_url).map_err(|e| FactError::Http(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(FactError::Http(format!("{base_url} cannot carry a path")));
        }
        Ok(Self { client, base_url })
    }

    /// The symbol is one escaped path segment, so `/` or `?` in it cannot change the route.
    fn url(&self, symbol: &str) -> Result<reqwest::Url, FactError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FactError::Http(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(["stock", symbol, "quote"]);
        Ok(url)
    }
}

#[async_trait]
impl FactSource for HttpFactSource {
    async fn current_price(&self, symbol: &str) -> Result<Quote, FactError> {
        info!(symbol, "requesting quote");
        let resp = self
            .client
            .get(self.url(symbol)?)
            .send()
            .await
            .map_err(|e| FactError::Http(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FactError::NotFound(symbol.to_string()));
        }
        let body = resp.text().await.map_err(|e| FactError::Http(e.to_string()))?;
        if body.trim() == UNKNOWN_SYMBOL_BODY {
            return Err(FactError::NotFound(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(FactError::Http(format!("status {status}")));
        }
        let parsed: QuoteBody =
            serde_json::from_str(&body).map_err(|e| FactError::Malformed(e.to_string()))?;
        debug!(symbol, price = parsed.latest_price, "quote received");
        Ok(Quote {
            symbol: symbol.to_string(),
            name: parsed.company_name,
            exchange: parsed.primary_exchange,
            price: parsed.latest_price,
        })
    }
}

/// In-memory prices. Prices can be changed while running.
#[derive(Debug, Default)]
pub struct StaticFactSource {
    quotes: RwLock<BTreeMap<String, Quote>>,
}

impl StaticFactSource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style price insert.
    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.set_price(symbol, price);
        self
    }

    /// Set or replace the price of `symbol`.
    pub fn set_price(&self, symbol: &str, price: f64) {
        let quote = Quote {
            symbol: symbol.to_string(),
            name: symbol.to_uppercase(),
            exchange: "STATIC".to_string(),
            price,
        };
        self.quotes_mut().insert(symbol.to_string(), quote);
    }

    // Inserts are single map operations, so a poisoned lock still guards a consistent map.
    fn quotes_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Quote>> {
        self.quotes.write().unwrap_or_else(|poisoned| {
            warn!("price table lock poisoned; continuing with its contents");
            poisoned.into_inner()
        })
    }

    fn quotes_ref(&self) -> RwLockReadGuard<'_, BTreeMap<String, Quote>> {
        self.quotes.read().unwrap_or_else(|poisoned| {
            warn!("price table lock poisoned; continuing with its contents");
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl FactSource for StaticFactSource {
    async fn current_price(&self, symbol: &str) -> Result<Quote, FactError> {
        self.quotes_ref().get(symbol).cloned().ok_or_else(|| FactError::NotFound(symbol.to_string()))
    }
}
