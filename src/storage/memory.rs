//! In-memory store implementation.
//!
//! Provides a thread-safe in-memory backend for testing and development.
//! Data is not persisted across restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Store, StoreError};
use crate::core::contract::Contract;
use crate::core::types::ContractId;

/// In-memory store backend.
pub struct MemoryStore<C> {
    contracts: RwLock<HashMap<ContractId, C>>,
}

impl<C> MemoryStore<C> {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            contracts: RwLock::new(HashMap::new()),
        }
    }

    /// Number of contracts currently persisted.
    pub fn len(&self) -> usize {
        self.contracts.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of the contracts currently persisted.
    pub fn ids(&self) -> Vec<ContractId> {
        self.contracts
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl<C> Default for MemoryStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: Contract + Clone> Store<C> for MemoryStore<C> {
    async fn enqueue(&self, contract: &C) -> Result<(), StoreError> {
        let mut contracts = self
            .contracts
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        contracts.insert(contract.identifier().clone(), contract.clone());
        Ok(())
    }

    async fn dequeue(&self, id: &ContractId) -> Result<(), StoreError> {
        let mut contracts = self
            .contracts
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        contracts
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("contract: {}", id)))?;
        Ok(())
    }

    async fn load(&self) -> Result<HashMap<ContractId, C>, StoreError> {
        let contracts = self.contracts.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(contracts.clone())
    }

    async fn save(&self, snapshot: &HashMap<ContractId, Arc<C>>) -> Result<(), StoreError> {
        let mut contracts = self
            .contracts
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        *contracts = snapshot
            .iter()
            .map(|(id, c)| (id.clone(), C::clone(c)))
            .collect();
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut contracts = self
            .contracts
            .write()
            .map_err(|_| StoreError::LockPoisoned)?;
        contracts.clear();
        Ok(())
    }
}
