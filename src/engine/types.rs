//! Engine type definitions.
//!
//! This module contains error types, state enums, command types, and the
//! completion reports exchanged between workers and the run loop.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::types::ContractId;
use crate::storage::StoreError;

/// Errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A contract with this identifier is already active.
    #[error("contract already active: {0}")]
    DuplicateContract(String),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The engine has not been started yet.
    #[error("engine not started")]
    NotStarted,

    /// The engine was shut down and cannot be reused.
    #[error("engine closed")]
    Closed,

    /// Channel error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed but not yet started.
    Idle,
    /// Run loop is active.
    Running,
    /// Shut down; terminal.
    Closed,
}

/// Commands sent from the engine surface to the run loop.
pub(crate) enum EngineCommand<C> {
    /// Register a contract before it is pushed onto the pending queue.
    Register {
        contract: Arc<C>,
        response: oneshot::Sender<Result<(), EngineError>>,
    },
    /// Cancel a contract and mark it for deletion.
    Prune {
        id: ContractId,
        response: oneshot::Sender<()>,
    },
    /// Number of currently-active contracts.
    ActiveCount { response: oneshot::Sender<usize> },
    /// Whether a contract is currently active.
    IsActive {
        id: ContractId,
        response: oneshot::Sender<bool>,
    },
    /// Number of workers not currently bound to a contract.
    IdleWorkers { response: oneshot::Sender<usize> },
    /// Tear down all state and exit the loop.
    Shutdown { response: oneshot::Sender<()> },
}

/// Completion report sent by a worker back to the run loop.
#[derive(Debug)]
pub(crate) struct WatchReport {
    pub contract_id: ContractId,
    pub outcome: WatchOutcome,
}

/// How a watch ended.
#[derive(Debug)]
pub(crate) enum WatchOutcome {
    /// The deadline passed and the timeout action ran.
    Fired { action_failed: bool },
    /// The contract was pruned while the worker was watching it.
    Cancelled,
}

impl WatchReport {
    pub(crate) fn fired(contract_id: ContractId, action_failed: bool) -> Self {
        Self {
            contract_id,
            outcome: WatchOutcome::Fired { action_failed },
        }
    }

    pub(crate) fn cancelled(contract_id: ContractId) -> Self {
        Self {
            contract_id,
            outcome: WatchOutcome::Cancelled,
        }
    }
}
