//! Storage abstraction for persisting the active contract set.
//!
//! This module provides a trait-based store abstraction with pluggable
//! backends (in-memory, JSON file, etc.). The engine is the single writer:
//! it enqueues one contract after every successful enqueue and rewrites the
//! full snapshot after every completion, so store contents always equal the
//! live working set when the engine is idle.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::contract::Contract;
use crate::core::types::ContractId;

/// Errors that can occur at the store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested contract was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Store lock was poisoned.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic store error.
    #[error("store error: {0}")]
    Other(String),
}

/// Durable persistence capability consumed by the engine.
///
/// `load` is called exactly once, at engine construction, when a store is
/// configured. `enqueue` is additive: it records a single contract without
/// touching the rest of the history. `clear` followed by `save` rewrites the
/// complete snapshot.
#[async_trait]
pub trait Store<C: Contract>: Send + Sync {
    /// Add one contract to the store.
    async fn enqueue(&self, contract: &C) -> Result<(), StoreError>;

    /// Remove one contract from the store by id.
    async fn dequeue(&self, id: &ContractId) -> Result<(), StoreError>;

    /// Load the persisted contract history.
    async fn load(&self) -> Result<HashMap<ContractId, C>, StoreError>;

    /// Persist the complete active snapshot.
    async fn save(&self, snapshot: &HashMap<ContractId, Arc<C>>) -> Result<(), StoreError>;

    /// Remove all persisted contracts.
    async fn clear(&self) -> Result<(), StoreError>;
}
