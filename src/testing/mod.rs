//! Testing utilities for users of the overdue library.
//!
//! This module provides helpers for testing deadline-driven code:
//!
//! - [`TestContract`]: a contract that records firings and reported errors
//! - [`wait_until`]: poll a condition instead of sleeping a fixed time

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::contract::{ActionError, Contract};
use crate::core::types::ContractId;

/// Shared observable state of a [`TestContract`].
///
/// Cloned contracts share this state, so a test can keep a clone as a probe
/// after handing the contract to an engine.
#[derive(Debug, Default)]
struct WatchState {
    fired: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

/// A contract for tests: fires into a counter instead of the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestContract {
    id: ContractId,
    deadline: DateTime<Utc>,
    fail_action: bool,
    #[serde(skip)]
    state: Arc<WatchState>,
}

impl TestContract {
    /// Create a contract with an explicit deadline.
    pub fn new(id: impl Into<String>, deadline: DateTime<Utc>) -> Self {
        Self {
            id: ContractId::new(id),
            deadline,
            fail_action: false,
            state: Arc::new(WatchState::default()),
        }
    }

    /// Create a contract whose deadline has already passed.
    pub fn expired(id: impl Into<String>) -> Self {
        Self::new(id, Utc::now() - chrono::Duration::seconds(1))
    }

    /// Create a contract expiring after the given duration.
    pub fn expiring_in(id: impl Into<String>, delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay).expect("delay out of range");
        Self::new(id, Utc::now() + delay)
    }

    /// Create an already-expired contract whose action always fails.
    pub fn failing(id: impl Into<String>) -> Self {
        let mut contract = Self::expired(id);
        contract.fail_action = true;
        contract
    }

    /// Number of times the timeout action has run.
    pub fn fired_count(&self) -> usize {
        self.state.fired.load(Ordering::SeqCst)
    }

    /// Errors reported through [`Contract::report_error`].
    pub fn reported_errors(&self) -> Vec<String> {
        self.state.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Wait until the action has fired at least once.
    ///
    /// # Panics
    ///
    /// Panics if the timeout is reached first.
    pub async fn wait_until_fired(&self, timeout: Duration) {
        let start = tokio::time::Instant::now();
        while self.fired_count() == 0 {
            if start.elapsed() > timeout {
                panic!("contract '{}' never fired within {:?}", self.id, timeout);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Contract for TestContract {
    fn identifier(&self) -> &ContractId {
        &self.id
    }

    fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    async fn execute_timeout_action(&self) -> Result<(), ActionError> {
        self.state.fired.fetch_add(1, Ordering::SeqCst);
        if self.fail_action {
            return Err(ActionError::Failed("test action failed".to_string()));
        }
        Ok(())
    }

    fn report_error(&self, error: &ActionError) {
        if let Ok(mut errors) = self.state.errors.lock() {
            errors.push(error.to_string());
        }
    }
}

/// Poll a condition every 10ms until it holds.
///
/// More reliable than fixed sleeps since scheduling time can vary.
///
/// # Panics
///
/// Panics if the timeout elapses before the condition holds.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    loop {
        if condition().await {
            return;
        }
        if start.elapsed() > timeout {
            panic!("timeout waiting for condition after {:?}", timeout);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
