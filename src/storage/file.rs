//! JSON-file store implementation.
//!
//! Persists the contract history as a single JSON object mapping contract id
//! to contract. Every mutation rewrites the file in full, so the on-disk
//! state is always a complete snapshot.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Store, StoreError};
use crate::core::contract::Contract;
use crate::core::types::ContractId;

/// File-backed store keeping the contract history in one JSON document.
pub struct FileStore<C> {
    path: PathBuf,
    _marker: PhantomData<fn() -> C>,
}

impl<C> FileStore<C> {
    /// Create a store backed by the given file path.
    ///
    /// The file does not need to exist yet; a missing file loads as an
    /// empty history.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<C> FileStore<C>
where
    C: Contract + Serialize + DeserializeOwned + Clone,
{
    async fn read_all(&self) -> Result<HashMap<ContractId, C>, StoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        if data.is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn write_all(&self, contracts: &HashMap<ContractId, C>) -> Result<(), StoreError> {
        let data = serde_json::to_vec(contracts)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl<C> Store<C> for FileStore<C>
where
    C: Contract + Serialize + DeserializeOwned + Clone,
{
    async fn enqueue(&self, contract: &C) -> Result<(), StoreError> {
        let mut contracts = self.read_all().await?;
        contracts.insert(contract.identifier().clone(), contract.clone());
        self.write_all(&contracts).await
    }

    async fn dequeue(&self, id: &ContractId) -> Result<(), StoreError> {
        let mut contracts = self.read_all().await?;
        contracts
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("contract: {}", id)))?;
        self.write_all(&contracts).await
    }

    async fn load(&self) -> Result<HashMap<ContractId, C>, StoreError> {
        self.read_all().await
    }

    async fn save(&self, snapshot: &HashMap<ContractId, Arc<C>>) -> Result<(), StoreError> {
        let contracts: HashMap<&ContractId, &C> =
            snapshot.iter().map(|(id, c)| (id, c.as_ref())).collect();
        let data = serde_json::to_vec(&contracts)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::write(&self.path, b"").await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
