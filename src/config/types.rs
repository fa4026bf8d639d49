//! Configuration type definitions.
//!
//! `EngineConfig` is the runtime value handed to the engine constructor;
//! the remaining types describe the YAML watch-file format consumed by the
//! CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration for the engine, passed to its constructor.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of workers in the pool; bounds concurrent in-flight watches.
    pub workers: usize,
    /// Polling granularity for deadline checks.
    pub heartbeat: Duration,
    /// Capacity of the pending queue; enqueue blocks when it is full.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            heartbeat: Duration::from_millis(1000),
            queue_capacity: 100,
        }
    }
}

impl EngineConfig {
    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the heartbeat interval.
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Set the pending-queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// Engine settings as they appear in a watch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Number of workers in the pool.
    pub workers: usize,
    /// Polling granularity in milliseconds.
    pub heartbeat_ms: u64,
    /// Capacity of the pending queue.
    pub queue_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            workers: config.workers,
            heartbeat_ms: config.heartbeat.as_millis() as u64,
            queue_capacity: config.queue_capacity,
        }
    }
}

impl EngineSettings {
    /// Convert to the runtime configuration value.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            workers: self.workers,
            heartbeat: Duration::from_millis(self.heartbeat_ms),
            queue_capacity: self.queue_capacity,
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreConfig {
    /// No durable store (default).
    #[serde(rename = "none")]
    #[default]
    None,
    /// JSON-file store.
    #[serde(rename = "file")]
    File {
        /// Path to the snapshot file.
        path: String,
    },
}

/// A single webhook watch definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Contract identifier, unique within the file.
    pub id: String,
    /// Absolute expiry time.
    pub expires_at: DateTime<Utc>,
    /// Endpoint to call when the deadline passes.
    pub url: String,
    /// HTTP method for the callback.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "POST".to_string()
}

/// A complete watch file: engine settings, store choice, and watches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchFile {
    /// Engine settings.
    pub engine: EngineSettings,
    /// Durable store configuration.
    pub store: StoreConfig,
    /// Watch definitions.
    pub watches: Vec<WatchConfig>,
}
