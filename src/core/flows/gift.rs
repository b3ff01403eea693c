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

//! Stock gift: price lookup, recipient signature, oracle attestation, finality.

use super::{checkpoint::Checkpoint, FlowError, Node};
use crate::core::{
    ledger::{
        builder::TransactionBuilder,
        states::{ContractState, GiftState},
        transaction::{CommandData, SignedTransaction},
    },
    oracle::fact_source::FactError,
    types::LinearId,
};
use std::collections::BTreeSet;
use tracing::info;

impl Node {
    /// Give `amount` units of `symbol` to `recipient`, valued at the current price.
    pub async fn give_away_stock(
        &self,
        symbol: &str,
        amount: u64,
        recipient: &str,
    ) -> Result<SignedTransaction, FlowError> {
        let mut cp = self.begin("GiveAwayStock")?;
        let outcome = self.give_away_run(&mut cp, symbol, amount, recipient).await;
        self.end(cp, outcome)
    }

    async fn give_away_run(
        &self,
        cp: &mut Checkpoint,
        symbol: &str,
        amount: u64,
        recipient: &str,
    ) -> Result<SignedTransaction, FlowError> {
        let recipient = self.network_map.party(recipient)?;
        let quote = self.fact_source.current_price(symbol).await.map_err(|e| match e {
            FactError::NotFound(s) => FlowError::UnknownSubject(s),
            other => FlowError::UnreachableParty(other.to_string()),
        })?;
        let unit_price = quote.price;
        info!(party = %self.identity, symbol, amount, unit_price, to = %recipient, "giving away stock");

        let gift = GiftState {
            symbol: symbol.to_string(),
            amount,
            price: unit_price * amount as f64,
            recipient: recipient.clone(),
            linear_id: LinearId::new(),
        };
        self.propose_gift(cp, gift, unit_price).await
    }

    /// Run a gift proposal through signing, attestation and finality. The claimed `unit_price`
    /// is what the oracle attests; the gift's total must equal `unit_price * amount`.
    async fn propose_gift(
        &self,
        cp: &mut Checkpoint,
        gift: GiftState,
        unit_price: f64,
    ) -> Result<SignedTransaction, FlowError> {
        let oracle = self.network_map.oracle()?.clone();
        let notary = self.network_map.router().default_notary()?.clone();
        let recipient_key = gift.recipient.owning_key;

        let mut builder = TransactionBuilder::new(notary);
        builder
            .add_output_state(ContractState::Gift(gift.clone()))
            .add_command(
                CommandData::GiveAway { symbol: gift.symbol.clone(), price: unit_price },
                [recipient_key, oracle.owning_key],
            );
        let (proposal, _) = builder.build()?;

        let pending = BTreeSet::from([oracle.owning_key]);
        let stx = self.sign_proposal(proposal)?;
        let stx = self.collect_signatures(cp, stx, &[], &pending).await?;
        let stx = self.collect_oracle_signature(cp, stx, &oracle).await?;
        self.finalise(cp, stx, &[]).await
    }
}
