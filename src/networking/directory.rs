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

//! Network map: who is who.

use crate::core::{
    notary::router::NotaryRouter,
    types::{Party, PublicKey},
};
use thiserror::Error;

/// Directory lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// No party carries the name.
    #[error("unknown party {0}")]
    UnknownParty(String),
    /// Two identities share a name.
    #[error("duplicate party name {0}")]
    Duplicate(String),
    /// The map has no oracle.
    #[error("no oracle registered")]
    NoOracle,
}

/// Parties, notaries (in registration order) and the oracle.
#[derive(Clone, Debug, Default)]
pub struct NetworkMap {
    parties: Vec<Party>,
    notaries: Vec<Party>,
    oracle: Option<Party>,
}

impl NetworkMap {
    /// Empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(&self, party: &Party) -> Result<(), DirectoryError> {
        if self.all().any(|p| p.name == party.name) {
            return Err(DirectoryError::Duplicate(party.name.clone()));
        }
        Ok(())
    }

    fn all(&self) -> impl Iterator<Item = &Party> {
        self.parties.iter().chain(self.notaries.iter()).chain(self.oracle.iter())
    }

    /// Register an ordinary party.
    pub fn add_party(&mut self, party: Party) -> Result<(), DirectoryError> {
        self.check_unique(&party)?;
        self.parties.push(party);
        Ok(())
    }

    /// Register a notary. The first one registered is the default notary.
    pub fn add_notary(&mut self, notary: Party) -> Result<(), DirectoryError> {
        self.check_unique(&notary)?;
        self.notaries.push(notary);
        Ok(())
    }

    /// Register the oracle.
    pub fn set_oracle(&mut self, oracle: Party) -> Result<(), DirectoryError> {
        self.check_unique(&oracle)?;
        self.oracle = Some(oracle);
        Ok(())
    }

    /// Resolve a name.
    pub fn party(&self, name: &str) -> Result<Party, DirectoryError> {
        self.all()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| DirectoryError::UnknownParty(name.to_string()))
    }

    /// Resolve an owning key.
    pub fn by_key(&self, key: &PublicKey) -> Option<&Party> {
        self.all().find(|p| p.owning_key == *key)
    }

    /// Notaries in registration order.
    pub fn notaries(&self) -> &[Party] {
        &self.notaries
    }

    /// Oracle identity.
    pub fn oracle(&self) -> Result<&Party, DirectoryError> {
        self.oracle.as_ref().ok_or(DirectoryError::NoOracle)
    }

    /// Router over the registered notaries.
    pub fn router(&self) -> NotaryRouter {
        NotaryRouter::new(self.notaries.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_name_and_key() {
        let mut map = NetworkMap::new();
        map.add_party(Party::new("PartyA", PublicKey([1; 32]))).unwrap();
        map.add_notary(Party::new("Notary-0", PublicKey([2; 32]))).unwrap();
        map.set_oracle(Party::new("Oracle", PublicKey([3; 32]))).unwrap();

        assert_eq!(map.party("Notary-0").unwrap().owning_key, PublicKey([2; 32]));
        assert_eq!(map.by_key(&PublicKey([3; 32])).map(|p| p.name.as_str()), Some("Oracle"));
        assert_eq!(map.party("Nobody"), Err(DirectoryError::UnknownParty("Nobody".into())));
        assert_eq!(
            map.add_party(Party::new("Oracle", PublicKey([4; 32]))),
            Err(DirectoryError::Duplicate("Oracle".into()))
        );
    }
}
