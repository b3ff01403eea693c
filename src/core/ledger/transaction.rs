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

//! Transaction proposals, their Merkle-committed identity, and accumulated signatures.
//!
//! Each component (input ref, output, command, notary) becomes a leaf:
//!
//! nonce = H( "Ledgerflow-Tx-Nonce-v1" || salt || group || index )
//! leaf  = H( "Ledgerflow-Tx-Leaf-v1" || group || nonce || canonical(component) )
//!
//! and the transaction id is the Merkle root over all leaves in group order. Revealing a
//! leaf's nonce exposes nothing about the salt or any other component.

use crate::core::{
    ledger::{
        filtered::FilteredView,
        merkle::merkle_root,
        signing::{filtered_signing_bytes, tx_signing_bytes, uniqueness_signing_bytes},
        states::{StateAndRef, TransactionState},
    },
    security::keystore::verify_pubkey_bytes,
    types::{encode_canonical, CodecError, Party, PublicKey, Signature, StateRef, H256},
};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

const NONCE_DOMAIN: &[u8] = b"Ledgerflow-Tx-Nonce-v1";
const LEAF_DOMAIN: &[u8] = b"Ledgerflow-Tx-Leaf-v1";

/// Typed intent attached to a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CommandData {
    /// Create a new message.
    Send,
    /// Answer (consume) one or more messages.
    Reply,
    /// Gift stock at an oracle-attested unit price.
    GiveAway {
        /// Ticker symbol.
        symbol: String,
        /// Unit price as fetched from the fact source.
        price: f64,
    },
    /// Reissue a state under another notary without changing its content.
    NotaryChange {
        /// Notary the output is governed by.
        new_notary: Party,
    },
}

impl CommandData {
    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            CommandData::Send => "Send",
            CommandData::Reply => "Reply",
            CommandData::GiveAway { .. } => "GiveAway",
            CommandData::NotaryChange { .. } => "NotaryChange",
        }
    }
}

/// Command plus the keys that must sign for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Intent.
    pub data: CommandData,
    /// Required signers.
    pub signers: BTreeSet<PublicKey>,
}

/// Component group, in leaf order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentGroup {
    /// Consumed state references.
    Inputs = 0,
    /// Created states.
    Outputs = 1,
    /// Commands.
    Commands = 2,
    /// Governing notary.
    Notary = 3,
}

/// One hashed component of a proposal.
#[derive(Clone, Debug)]
pub(crate) struct ComponentLeaf {
    pub group: ComponentGroup,
    pub index: u32,
    pub nonce: H256,
    pub leaf: H256,
}

/// Per-component nonce derived from the private salt.
fn component_nonce(salt: &[u8; 32], group: ComponentGroup, index: u32) -> H256 {
    let mut buf = Vec::with_capacity(NONCE_DOMAIN.len() + 32 + 1 + 4);
    buf.extend_from_slice(NONCE_DOMAIN);
    buf.extend_from_slice(salt);
    buf.push(group as u8);
    buf.extend_from_slice(&index.to_be_bytes());
    H256::digest(&buf)
}

/// Leaf hash of a component given its group, nonce and canonical bytes.
pub fn component_leaf(group: ComponentGroup, nonce: &H256, component_bytes: &[u8]) -> H256 {
    let mut buf = Vec::with_capacity(LEAF_DOMAIN.len() + 1 + 32 + component_bytes.len());
    buf.extend_from_slice(LEAF_DOMAIN);
    buf.push(group as u8);
    buf.extend_from_slice(nonce.as_bytes());
    buf.extend_from_slice(component_bytes);
    H256::digest(&buf)
}

/// An unsigned, well-formed transaction proposal with exactly one notary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Consumed states, in order.
    pub inputs: Vec<StateRef>,
    /// Created states.
    pub outputs: Vec<TransactionState>,
    /// Commands.
    pub commands: Vec<Command>,
    /// The one notary governing this transaction.
    pub notary: Party,
    /// Private salt for component nonces. Never revealed in filtered views.
    pub privacy_salt: [u8; 32],
}

impl Proposal {
    /// Fresh random privacy salt. `None` if the system RNG fails.
    pub fn random_salt() -> Option<[u8; 32]> {
        let mut salt = [0u8; 32];
        SystemRandom::new().fill(&mut salt).ok()?;
        Some(salt)
    }

    /// Canonical bytes of the component at (`group`, `index`).
    pub(crate) fn component_bytes(
        &self,
        group: ComponentGroup,
        index: u32,
    ) -> Result<Option<Vec<u8>>, CodecError> {
        let i = index as usize;
        let bytes = match group {
            ComponentGroup::Inputs => self.inputs.get(i).map(encode_canonical).transpose()?,
            ComponentGroup::Outputs => self.outputs.get(i).map(encode_canonical).transpose()?,
            ComponentGroup::Commands => self.commands.get(i).map(encode_canonical).transpose()?,
            ComponentGroup::Notary if i == 0 => Some(encode_canonical(&self.notary)?),
            ComponentGroup::Notary => None,
        };
        Ok(bytes)
    }

    /// All component leaves, in Merkle order.
    pub(crate) fn leaves(&self) -> Result<Vec<ComponentLeaf>, CodecError> {
        let groups = [
            (ComponentGroup::Inputs, self.inputs.len()),
            (ComponentGroup::Outputs, self.outputs.len()),
            (ComponentGroup::Commands, self.commands.len()),
            (ComponentGroup::Notary, 1),
        ];
        let mut out = Vec::new();
        for (group, len) in groups {
            for index in 0..len as u32 {
                let Some(bytes) = self.component_bytes(group, index)? else {
                    continue;
                };
                let nonce = component_nonce(&self.privacy_salt, group, index);
                let leaf = component_leaf(group, &nonce, &bytes);
                out.push(ComponentLeaf { group, index, nonce, leaf });
            }
        }
        Ok(out)
    }

    /// Transaction id: Merkle root over component leaves.
    pub fn id(&self) -> Result<H256, CodecError> {
        let leaves: Vec<H256> = self.leaves()?.into_iter().map(|l| l.leaf).collect();
        Ok(merkle_root(&leaves))
    }

    /// Union of every command's required signers.
    pub fn required_signers(&self) -> BTreeSet<PublicKey> {
        self.commands.iter().flat_map(|c| c.signers.iter().copied()).collect()
    }

    /// Attach resolved input states, checking they match the referenced inputs.
    pub fn resolve(&self, inputs: Vec<StateAndRef>) -> Result<LedgerTransaction, ResolutionError> {
        if inputs.len() != self.inputs.len() {
            return Err(ResolutionError::CountMismatch);
        }
        for (want, got) in self.inputs.iter().zip(inputs.iter()) {
            if *want != got.reference {
                return Err(ResolutionError::RefMismatch(*want));
            }
        }
        Ok(LedgerTransaction {
            id: self.id().map_err(|_| ResolutionError::Codec)?,
            inputs,
            outputs: self.outputs.clone(),
            commands: self.commands.clone(),
            notary: self.notary.clone(),
        })
    }
}

/// Input resolution errors.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// Fewer or more resolved states than input references.
    #[error("resolved input count does not match")]
    CountMismatch,
    /// A resolved state answers a different reference.
    #[error("resolved input does not match reference {0}")]
    RefMismatch(StateRef),
    /// The vault has never seen this input.
    #[error("input {0} is unknown")]
    Unknown(StateRef),
    /// The input is already spent.
    #[error("input {0} is already consumed")]
    Consumed(StateRef),
    /// The supplied state differs from the recorded one.
    #[error("input {0} differs from the locally recorded state")]
    Conflicting(StateRef),
    /// A state could not be encoded.
    #[error("codec")]
    Codec,
}

/// A proposal with its consumed states resolved, ready for contract verification.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerTransaction {
    /// Transaction id.
    pub id: H256,
    /// Consumed states.
    pub inputs: Vec<StateAndRef>,
    /// Created states.
    pub outputs: Vec<TransactionState>,
    /// Commands.
    pub commands: Vec<Command>,
    /// Governing notary.
    pub notary: Party,
}

/// What a signature was computed over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScope {
    /// The whole transaction id.
    Transaction,
    /// A filtered view revealing the listed leaf positions.
    FilteredView {
        /// Revealed Merkle leaf positions.
        positions: Vec<u32>,
    },
    /// A notary's uniqueness attestation.
    Uniqueness,
}

/// One (signer-key, signature) pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    /// Signer key.
    pub by: PublicKey,
    /// Signature bytes.
    pub signature: Signature,
    /// Signed content.
    pub scope: SignatureScope,
}

/// Signature verification errors.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The id is not the Merkle root of the components.
    #[error("transaction id does not match content")]
    IdMismatch,
    /// A signature does not verify for its key.
    #[error("invalid signature by {0}")]
    Invalid(PublicKey),
    /// Required signers that have not signed.
    #[error("missing signatures from {}", fmt_keys(.0))]
    Missing(BTreeSet<PublicKey>),
    /// A state could not be encoded.
    #[error("codec")]
    Codec,
}

fn fmt_keys(keys: &BTreeSet<PublicKey>) -> String {
    keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

/// A proposal plus an accumulating set of signatures. The id is fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// Transaction id.
    pub id: H256,
    /// Signed content.
    pub tx: Proposal,
    /// Signatures collected so far.
    pub sigs: Vec<TransactionSignature>,
}

impl SignedTransaction {
    /// Wrap a proposal with its first signature.
    pub fn new(tx: Proposal, sigs: Vec<TransactionSignature>) -> Result<Self, CodecError> {
        let id = tx.id()?;
        Ok(Self { id, tx, sigs })
    }

    /// Copy with one more signature. Duplicate (key, scope) pairs are ignored.
    pub fn with_signature(mut self, sig: TransactionSignature) -> Self {
        if !self.sigs.iter().any(|s| s.by == sig.by && s.scope == sig.scope) {
            self.sigs.push(sig);
        }
        self
    }

    /// Recompute the id from content and compare.
    pub fn check_id(&self) -> Result<(), SignatureError> {
        let id = self.tx.id().map_err(|_| SignatureError::Codec)?;
        if id != self.id {
            return Err(SignatureError::IdMismatch);
        }
        Ok(())
    }

    /// Bytes a given signature must have been computed over.
    pub fn signed_bytes(&self, scope: &SignatureScope, by: &PublicKey) -> Result<Vec<u8>, SignatureError> {
        match scope {
            SignatureScope::Transaction => Ok(tx_signing_bytes(&self.id)),
            SignatureScope::FilteredView { positions } => {
                let view = FilteredView::for_positions(&self.tx, positions)
                    .map_err(|_| SignatureError::Codec)?;
                Ok(filtered_signing_bytes(&view.view_id()))
            }
            SignatureScope::Uniqueness => Ok(uniqueness_signing_bytes(&self.id, by)),
        }
    }

    /// Keys that signed as transaction or view signers (not as notary).
    pub fn signers(&self) -> BTreeSet<PublicKey> {
        self.sigs
            .iter()
            .filter(|s| s.scope != SignatureScope::Uniqueness)
            .map(|s| s.by)
            .collect()
    }

    /// Verify every attached signature, then require all command signers except `allowed_missing`.
    pub fn verify_signatures_except(
        &self,
        allowed_missing: &BTreeSet<PublicKey>,
    ) -> Result<(), SignatureError> {
        self.check_id()?;
        for s in self.sigs.iter() {
            let msg = self.signed_bytes(&s.scope, &s.by)?;
            verify_pubkey_bytes(&s.by, &msg, &s.signature).map_err(|_| SignatureError::Invalid(s.by))?;
        }
        let signed = self.signers();
        let missing: BTreeSet<PublicKey> = self
            .tx
            .required_signers()
            .into_iter()
            .filter(|k| !signed.contains(k) && !allowed_missing.contains(k))
            .collect();
        if !missing.is_empty() {
            return Err(SignatureError::Missing(missing));
        }
        Ok(())
    }

    /// Verify every signature and require all command signers.
    pub fn verify_required_signatures(&self) -> Result<(), SignatureError> {
        self.verify_signatures_except(&BTreeSet::new())
    }

    /// True if the governing notary has attested uniqueness.
    pub fn is_notarised(&self) -> bool {
        self.sigs
            .iter()
            .any(|s| s.scope == SignatureScope::Uniqueness && s.by == self.tx.notary.owning_key)
    }

    /// References to this transaction's outputs.
    pub fn output_refs(&self) -> Vec<StateAndRef> {
        self.tx
            .outputs
            .iter()
            .enumerate()
            .map(|(i, state)| StateAndRef {
                state: state.clone(),
                reference: StateRef { tx_id: self.id, index: i as u32 },
            })
            .collect()
    }

    /// Every party named by an input or output participant set, deduplicated.
    pub fn participants(&self, inputs: &[StateAndRef]) -> BTreeSet<Party> {
        inputs
            .iter()
            .map(|i| &i.state)
            .chain(self.tx.outputs.iter())
            .flat_map(|s| s.data.participants())
            .collect()
    }
}

impl fmt::Display for SignedTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tx {} ({} in, {} out, {} sigs)",
            self.id,
            self.tx.inputs.len(),
            self.tx.outputs.len(),
            self.sigs.len()
        )
    }
}
