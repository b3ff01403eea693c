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

//! Message workflows: send, reply, reply to everything, delete by party (and type).

use super::{checkpoint::Checkpoint, FlowError, Node};
use crate::core::{
    ledger::{
        builder::{reply_signers, TransactionBuilder},
        states::{ContractState, MessageState, StateAndRef},
        transaction::{CommandData, SignedTransaction},
    },
    types::{LinearId, Party},
};
use std::collections::BTreeSet;
use tracing::info;

impl Node {
    /// Send `contents` of type `kind` to `recipient`. The notary is chosen by routing on `kind`.
    pub async fn send_message(
        &self,
        recipient: &str,
        contents: &str,
        kind: &str,
    ) -> Result<SignedTransaction, FlowError> {
        let mut cp = self.begin("SendMessage")?;
        let outcome = self.send_message_run(&mut cp, recipient, contents, kind).await;
        self.end(cp, outcome)
    }

    async fn send_message_run(
        &self,
        cp: &mut Checkpoint,
        recipient: &str,
        contents: &str,
        kind: &str,
    ) -> Result<SignedTransaction, FlowError> {
        let recipient = self.network_map.party(recipient)?;
        let notary = self.network_map.router().route_by_type(kind)?.clone();
        info!(party = %self.identity, to = %recipient, kind, notary = %notary, "sending message");

        let message = MessageState {
            sender: self.identity.clone(),
            recipient: recipient.clone(),
            contents: contents.to_string(),
            kind: kind.to_string(),
            linear_id: LinearId::new(),
        };
        let mut builder = TransactionBuilder::new(notary);
        builder
            .add_output_state(ContractState::Message(message))
            .add_command(CommandData::Send, [self.identity.owning_key, recipient.owning_key]);
        let (proposal, _) = builder.build()?;

        let stx = self.sign_proposal(proposal)?;
        let stx = self.collect_signatures(cp, stx, &[], &BTreeSet::new()).await?;
        self.finalise(cp, stx, &[]).await
    }

    /// Answer one open message addressed to us.
    pub async fn reply_to_message(&self, message: StateAndRef) -> Result<SignedTransaction, FlowError> {
        let mut cp = self.begin("ReplyToMessage")?;
        let outcome = self.reply_run(&mut cp, message).await;
        self.end(cp, outcome)
    }

    async fn reply_run(&self, cp: &mut Checkpoint, input: StateAndRef) -> Result<SignedTransaction, FlowError> {
        let Some(message) = input.state.data.as_message() else {
            return Err(FlowError::MalformedProposal("only messages can be replied to".into()));
        };
        if message.recipient != self.identity {
            return Err(FlowError::MalformedProposal(format!(
                "message {} is addressed to {}",
                input.reference, message.recipient
            )));
        }
        let reply = message.reply();
        info!(party = %self.identity, to = %reply.recipient, input = %input.reference, "replying");

        let signers = reply_signers(std::slice::from_ref(&input), &self.identity)?;
        let mut builder = TransactionBuilder::new(input.state.notary.clone());
        builder
            .add_input_state(input.clone())
            .add_output_state(ContractState::Message(reply))
            .add_command(CommandData::Reply, signers);
        let (proposal, _) = builder.build()?;

        let inputs = [input];
        let stx = self.sign_proposal(proposal)?;
        let stx = self.collect_signatures(cp, stx, &inputs, &BTreeSet::new()).await?;
        self.finalise(cp, stx, &inputs).await
    }

    /// Reply to every open message not sent by us, one transaction each, in vault order.
    pub async fn reply_to_messages(&self) -> Result<Vec<SignedTransaction>, FlowError> {
        let open = self.repository.find_all_new_not_by_sender(&self.identity)?;
        info!(party = %self.identity, count = open.len(), "replying to open messages");
        let mut out = Vec::with_capacity(open.len());
        for message in open {
            out.push(self.reply_to_message(message).await?);
        }
        Ok(out)
    }

    /// Consume every open message sent by `party` in one transaction. The notary governing
    /// most of them is used; the rest are moved to it first.
    pub async fn delete_all_messages_from_party(&self, party: &str) -> Result<SignedTransaction, FlowError> {
        let mut cp = self.begin("DeleteAllMessagesFromParty")?;
        let outcome = self.delete_from_party_run(&mut cp, party).await;
        self.end(cp, outcome)
    }

    async fn delete_from_party_run(&self, cp: &mut Checkpoint, party: &str) -> Result<SignedTransaction, FlowError> {
        let party = self.network_map.party(party)?;
        let messages = self.repository.find_all_new_by_sender(&party)?;
        let notary = self.network_map.router().majority(&messages)?;
        self.delete_run(cp, messages, notary).await
    }

    /// Consume every open message of type `kind` sent by `party`, under the notary that
    /// messages of that type are routed to.
    pub async fn delete_all_messages_from_party_by_type(
        &self,
        party: &str,
        kind: &str,
    ) -> Result<SignedTransaction, FlowError> {
        let mut cp = self.begin("DeleteAllMessagesFromPartyByType")?;
        let outcome = self.delete_by_type_run(&mut cp, party, kind).await;
        self.end(cp, outcome)
    }

    async fn delete_by_type_run(
        &self,
        cp: &mut Checkpoint,
        party: &str,
        kind: &str,
    ) -> Result<SignedTransaction, FlowError> {
        let party = self.network_map.party(party)?;
        let messages = self.repository.find_all_new_by_sender_and_type(&party, kind)?;
        let notary = self.network_map.router().route_by_type(kind)?.clone();
        self.delete_run(cp, messages, notary).await
    }

    async fn delete_run(
        &self,
        cp: &mut Checkpoint,
        messages: Vec<StateAndRef>,
        notary: Party,
    ) -> Result<SignedTransaction, FlowError> {
        info!(party = %self.identity, count = messages.len(), notary = %notary, "deleting messages");
        let mut inputs = Vec::with_capacity(messages.len());
        for message in messages {
            inputs.push(self.change_notary(cp, message, &notary).await?);
        }

        let signers = reply_signers(&inputs, &self.identity)?;
        let mut builder = TransactionBuilder::new(notary);
        for input in inputs.iter() {
            builder.add_input_state(input.clone());
        }
        builder.add_command(CommandData::Reply, signers);
        let (proposal, _) = builder.build()?;

        let stx = self.sign_proposal(proposal)?;
        let stx = self.collect_signatures(cp, stx, &inputs, &BTreeSet::new()).await?;
        self.finalise(cp, stx, &inputs).await
    }
}
