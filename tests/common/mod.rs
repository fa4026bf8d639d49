//! Common test utilities shared across integration tests.

use async_trait::async_trait;
use overdue::{Event, EventHandler};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Recording event handler for verifying engine behavior through events.
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Ids of fired contracts, in firing order.
    pub async fn fired_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                Event::ContractFired { id, .. } => Some(id.to_string()),
                _ => None,
            })
            .collect()
    }

    /// Ids of dispatched contracts, in dispatch order.
    pub async fn dispatched_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|e| match e {
                Event::ContractDispatched { id, .. } => Some(id.to_string()),
                _ => None,
            })
            .collect()
    }

    pub async fn fired_count(&self) -> usize {
        self.fired_ids().await.len()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}
