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

//! Transaction proposal builder.

use crate::core::{
    ledger::{
        contract::{self, ContractError},
        states::{ContractState, StateAndRef, TransactionState},
        transaction::{Command, CommandData, LedgerTransaction, Proposal},
    },
    types::{Party, PublicKey, StateRef},
};
use std::collections::BTreeSet;
use thiserror::Error;

/// Reasons a proposal cannot be built.
#[derive(Debug, Error)]
pub enum BuildError {
    /// An input names a different notary than the proposal.
    #[error("input {0} is governed by another notary; migrate it first")]
    MixedNotaries(StateRef),
    /// A command ended up with an empty signer set.
    #[error("command {0} has no required signers")]
    NoSigners(&'static str),
    /// Signers could not be derived from the states involved.
    #[error("required signers cannot be derived: {0}")]
    UnderivableSigners(&'static str),
    /// The proposal breaks the contract rules.
    #[error("contract: {0}")]
    Contract(#[from] ContractError),
    /// The system RNG failed.
    #[error("no randomness for the privacy salt")]
    Entropy,
    /// A component could not be encoded.
    #[error("codec")]
    Codec,
}

/// Accumulates inputs, outputs and commands under one notary.
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    notary: Party,
    inputs: Vec<StateAndRef>,
    outputs: Vec<TransactionState>,
    commands: Vec<Command>,
}

impl TransactionBuilder {
    /// Empty builder for `notary`.
    pub fn new(notary: Party) -> Self {
        Self { notary, inputs: Vec::new(), outputs: Vec::new(), commands: Vec::new() }
    }

    /// Consume a state.
    pub fn add_input_state(&mut self, input: StateAndRef) -> &mut Self {
        self.inputs.push(input);
        self
    }

    /// Create a state governed by the builder's notary.
    pub fn add_output_state(&mut self, data: ContractState) -> &mut Self {
        let notary = self.notary.clone();
        self.outputs.push(TransactionState { data, notary });
        self
    }

    /// Create a state with an explicit notary (notary change only).
    pub fn add_output_with_notary(&mut self, state: TransactionState) -> &mut Self {
        self.outputs.push(state);
        self
    }

    /// Attach a command and its required signers.
    pub fn add_command<I>(&mut self, data: CommandData, signers: I) -> &mut Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.commands.push(Command { data, signers: signers.into_iter().collect() });
        self
    }

    /// Consumed states added so far.
    pub fn inputs(&self) -> &[StateAndRef] {
        &self.inputs
    }

    /// Governing notary.
    pub fn notary(&self) -> &Party {
        &self.notary
    }

    /// Produce the unsigned proposal and its resolved form, enforcing the structural rules and
    /// every contract invariant.
    pub fn build(&self) -> Result<(Proposal, LedgerTransaction), BuildError> {
        let is_notary_change = self
            .commands
            .iter()
            .any(|c| matches!(c.data, CommandData::NotaryChange { .. }));
        if !is_notary_change {
            if let Some(stray) = self.inputs.iter().find(|i| i.state.notary != self.notary) {
                return Err(BuildError::MixedNotaries(stray.reference));
            }
        }
        if let Some(c) = self.commands.iter().find(|c| c.signers.is_empty()) {
            return Err(BuildError::NoSigners(c.data.name()));
        }

        let proposal = Proposal {
            inputs: self.inputs.iter().map(|i| i.reference).collect(),
            outputs: self.outputs.clone(),
            commands: self.commands.clone(),
            notary: self.notary.clone(),
            privacy_salt: Proposal::random_salt().ok_or(BuildError::Entropy)?,
        };
        let ltx = proposal.resolve(self.inputs.clone()).map_err(|_| BuildError::Codec)?;
        contract::verify(&ltx)?;
        Ok((proposal, ltx))
    }
}

/// Signers of a `Reply`: every participant of every consumed state plus the initiator.
pub fn reply_signers(
    inputs: &[StateAndRef],
    initiator: &Party,
) -> Result<BTreeSet<PublicKey>, BuildError> {
    if inputs.is_empty() {
        return Err(BuildError::UnderivableSigners("a reply without consumed messages"));
    }
    let mut keys: BTreeSet<PublicKey> =
        inputs.iter().flat_map(|i| i.state.data.participant_keys()).collect();
    keys.insert(initiator.owning_key);
    Ok(keys)
}
