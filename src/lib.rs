pub mod config;
pub mod core;
pub mod engine;
pub mod events;
pub mod storage;
pub mod testing;
pub mod webhook;

pub use config::{load_watch_file, ConfigError, EngineConfig, StoreConfig, WatchConfig, WatchFile};
pub use crate::core::contract::{ActionError, Contract};
pub use crate::core::types::ContractId;
pub use engine::{Engine, EngineError, EngineState};
pub use events::{Event, EventBus, EventHandler};
pub use storage::{FileStore, MemoryStore, Store, StoreError};
pub use webhook::WebhookContract;
