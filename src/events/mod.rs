//! Lifecycle events and event handling.
//!
//! This module provides event emission for contract lifecycle events,
//! enabling observability into the engine's scheduling decisions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::core::types::ContractId;

/// Lifecycle events emitted by the engine's run loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// A contract was accepted and queued for dispatch.
    ContractEnqueued {
        id: ContractId,
        deadline: DateTime<Utc>,
        timestamp: Instant,
    },

    /// A contract was handed to a worker.
    ContractDispatched {
        id: ContractId,
        worker: usize,
        timestamp: Instant,
    },

    /// A contract expired and its timeout action ran.
    ContractFired {
        id: ContractId,
        action_failed: bool,
        timestamp: Instant,
    },

    /// A contract was pruned while a worker was watching it.
    ContractPruned {
        id: ContractId,
        timestamp: Instant,
    },

    /// A contract was pruned before a worker was ever assigned.
    ContractDropped {
        id: ContractId,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::ContractEnqueued { timestamp, .. } => *timestamp,
            Event::ContractDispatched { timestamp, .. } => *timestamp,
            Event::ContractFired { timestamp, .. } => *timestamp,
            Event::ContractPruned { timestamp, .. } => *timestamp,
            Event::ContractDropped { timestamp, .. } => *timestamp,
        }
    }

    /// Identifier of the contract the event concerns.
    pub fn contract_id(&self) -> &ContractId {
        match self {
            Event::ContractEnqueued { id, .. } => id,
            Event::ContractDispatched { id, .. } => id,
            Event::ContractFired { id, .. } => id,
            Event::ContractPruned { id, .. } => id,
            Event::ContractDropped { id, .. } => id,
        }
    }

    /// Create a ContractEnqueued event.
    pub fn enqueued(id: ContractId, deadline: DateTime<Utc>) -> Self {
        Event::ContractEnqueued {
            id,
            deadline,
            timestamp: Instant::now(),
        }
    }

    /// Create a ContractDispatched event.
    pub fn dispatched(id: ContractId, worker: usize) -> Self {
        Event::ContractDispatched {
            id,
            worker,
            timestamp: Instant::now(),
        }
    }

    /// Create a ContractFired event.
    pub fn fired(id: ContractId, action_failed: bool) -> Self {
        Event::ContractFired {
            id,
            action_failed,
            timestamp: Instant::now(),
        }
    }

    /// Create a ContractPruned event.
    pub fn pruned(id: ContractId) -> Self {
        Event::ContractPruned {
            id,
            timestamp: Instant::now(),
        }
    }

    /// Create a ContractDropped event.
    pub fn dropped(id: ContractId) -> Self {
        Event::ContractDropped {
            id,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
