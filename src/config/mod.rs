//! Configuration loading and parsing.
//!
//! This module provides the engine's runtime configuration plus YAML-based
//! watch definitions for the CLI.

mod types;
mod yaml;

pub use types::{EngineConfig, EngineSettings, StoreConfig, WatchConfig, WatchFile};
pub use yaml::{load_watch_file, ConfigError};
