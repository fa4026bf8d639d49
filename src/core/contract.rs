//! Contract trait and action error types.
//!
//! A `Contract` is the fundamental unit of work in the engine: an entity
//! with a unique identifier and an absolute expiry, plus the action to run
//! if the expiry is reached before the contract is pruned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::time;
use super::types::ContractId;

/// Errors produced by a contract's timeout action.
///
/// These never propagate past the worker that ran the action; they are
/// handed back to the contract through [`Contract::report_error`].
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action ran and failed with a message.
    #[error("action failed: {0}")]
    Failed(String),

    /// The action could not reach its target.
    #[error("unreachable target: {0}")]
    Unreachable(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The core trait for entities watched by the engine.
///
/// # Example
///
/// ```ignore
/// use overdue::{ActionError, Contract, ContractId};
/// use async_trait::async_trait;
/// use chrono::{DateTime, Utc};
///
/// struct AckWatch {
///     id: ContractId,
///     expires_at: DateTime<Utc>,
/// }
///
/// #[async_trait]
/// impl Contract for AckWatch {
///     fn identifier(&self) -> &ContractId {
///         &self.id
///     }
///
///     fn deadline(&self) -> DateTime<Utc> {
///         self.expires_at
///     }
///
///     async fn execute_timeout_action(&self) -> Result<(), ActionError> {
///         // nobody acknowledged in time; escalate
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Contract: Send + Sync + 'static {
    /// Returns the unique identifier for this contract.
    ///
    /// An identifier may not be enqueued again while it is still active.
    fn identifier(&self) -> &ContractId;

    /// Returns the absolute point in time at which the contract expires.
    fn deadline(&self) -> DateTime<Utc>;

    /// Check whether the contract considers itself expired.
    ///
    /// The engine performs its own deadline comparison on every heartbeat in
    /// addition to this check, so overriding it can only widen the expiry
    /// condition, never suppress it.
    fn has_expired(&self) -> bool {
        time::is_past(self.deadline())
    }

    /// Execute the timeout action.
    ///
    /// Called at most once per active contract, after the deadline has
    /// passed and only if the contract was not pruned first.
    async fn execute_timeout_action(&self) -> Result<(), ActionError>;

    /// Report a failed timeout action.
    ///
    /// Default implementation logs the error; implementations can route it
    /// elsewhere (metrics, dead-letter queues, ...).
    fn report_error(&self, error: &ActionError) {
        tracing::error!(id = %self.identifier(), error = %error, "timeout action failed");
    }
}
