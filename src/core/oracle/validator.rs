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

//! Oracle side of price attestation.
//!
//! The oracle only ever sees a [`FilteredView`]. It checks the revealed commands against the
//! transaction id, re-fetches every claimed price itself, and signs the view identity only if
//! each claim is bit-for-bit equal to the fresh price.

use crate::core::{
    ledger::{
        filtered::FilteredView,
        signing::filtered_signing_bytes,
        transaction::{CommandData, SignatureScope, TransactionSignature},
    },
    oracle::fact_source::{FactError, FactSource, Quote},
    security::keystore::Keystore,
    types::Party,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Why an attestation was refused. Serialisable so it can travel back to the initiator.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationError {
    /// The claimed fact does not match the source.
    #[error("invalid attestation: {0}")]
    InvalidAttestation(String),
    /// The source has no quote for the symbol.
    #[error("unknown subject: {0}")]
    UnknownSubject(String),
    /// The source could not be reached.
    #[error("fact source unavailable: {0}")]
    Unavailable(String),
    /// The oracle key refused to sign.
    #[error("signing failed")]
    Signing,
}

/// Price-attesting oracle.
pub struct PriceOracle {
    identity: Party,
    keystore: Arc<Keystore>,
    fact_source: Arc<dyn FactSource>,
}

impl PriceOracle {
    /// Oracle signing as `identity` with `keystore`.
    pub fn new(identity: Party, keystore: Arc<Keystore>, fact_source: Arc<dyn FactSource>) -> Self {
        Self { identity, keystore, fact_source }
    }

    /// Oracle identity.
    pub fn identity(&self) -> &Party {
        &self.identity
    }

    /// Fetch `symbol` and require bit-exact equality with `claimed`.
    pub async fn validate_price(&self, symbol: &str, claimed: f64) -> Result<Quote, AttestationError> {
        let quote = self.fact_source.current_price(symbol).await.map_err(|e| match e {
            FactError::NotFound(s) => AttestationError::UnknownSubject(s),
            other => AttestationError::Unavailable(other.to_string()),
        })?;
        info!(symbol, name = %quote.name, claimed, actual = quote.price, "validating price");
        if quote.price.to_bits() != claimed.to_bits() {
            return Err(AttestationError::InvalidAttestation(format!(
                "the price of {symbol} is {}, not {claimed}",
                quote.price
            )));
        }
        Ok(quote)
    }

    /// Check and sign a filtered view.
    pub async fn attest(&self, view: &FilteredView) -> Result<TransactionSignature, AttestationError> {
        let outcome = self.check(view).await;
        if let Err(e) = &outcome {
            warn!(tx_id = %view.tx_id, error = %e, "refusing to attest");
            return Err(e.clone());
        }

        let view_id = view.view_id();
        let signature = self
            .keystore
            .sign(&filtered_signing_bytes(&view_id))
            .map_err(|_| AttestationError::Signing)?;
        info!(tx_id = %view.tx_id, view_id = %view_id, "attested filtered view");
        Ok(TransactionSignature {
            by: self.identity.owning_key,
            signature,
            scope: SignatureScope::FilteredView { positions: view.positions() },
        })
    }

    async fn check(&self, view: &FilteredView) -> Result<(), AttestationError> {
        view.verify().map_err(|e| AttestationError::InvalidAttestation(e.to_string()))?;
        if view.commands.is_empty() {
            return Err(AttestationError::InvalidAttestation("nothing to attest".into()));
        }
        for revealed in view.commands.iter() {
            let cmd = &revealed.command;
            let CommandData::GiveAway { symbol, price } = &cmd.data else {
                return Err(AttestationError::InvalidAttestation(format!(
                    "{} commands are not attestable",
                    cmd.data.name()
                )));
            };
            if !cmd.signers.contains(&self.identity.owning_key) {
                return Err(AttestationError::InvalidAttestation(
                    "oracle is not a required signer".into(),
                ));
            }
            self.validate_price(symbol, *price).await?;
        }
        Ok(())
    }
}
