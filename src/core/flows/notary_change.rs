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

//! Notary change: reissue a state under another notary, content unchanged.

use super::{checkpoint::Checkpoint, FlowError, Node};
use crate::core::{
    ledger::{
        builder::TransactionBuilder,
        states::{StateAndRef, TransactionState},
        transaction::CommandData,
    },
    types::Party,
};
use tracing::info;

impl Node {
    /// Move `input` to `new_notary`. A state already under `new_notary` is returned as is.
    /// The change is notarised by the current notary and recorded by every participant.
    pub async fn change_notary(
        &self,
        cp: &mut Checkpoint,
        input: StateAndRef,
        new_notary: &Party,
    ) -> Result<StateAndRef, FlowError> {
        if input.state.notary == *new_notary {
            return Ok(input);
        }
        let old = input.state.notary.clone();

        let mut builder = TransactionBuilder::new(old.clone());
        builder
            .add_input_state(input.clone())
            .add_output_with_notary(TransactionState {
                data: input.state.data.clone(),
                notary: new_notary.clone(),
            })
            .add_command(
                CommandData::NotaryChange { new_notary: new_notary.clone() },
                [self.identity.owning_key],
            );
        let (proposal, _) = builder.build()?;
        let stx = self.sign_proposal(proposal)?;
        let stx = self.finalise(cp, stx, &[input]).await?;

        let moved = stx
            .output_refs()
            .into_iter()
            .next()
            .ok_or_else(|| FlowError::MalformedProposal("notary change without output".into()))?;
        info!(from = %old, to = %new_notary, state = %moved.reference, "notary changed");
        Ok(moved)
    }
}
