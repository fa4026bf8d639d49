//! YAML watch-file parsing.
//!
//! Parses watch definitions and engine settings from a single YAML file and
//! validates them before they reach the engine.

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::types::WatchFile;

/// HTTP methods accepted for webhook callbacks.
const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD"];

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Load and validate a watch file.
pub fn load_watch_file(path: impl AsRef<Path>) -> Result<WatchFile, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let file: WatchFile = serde_yaml::from_str(&contents)?;
    validate(&file)?;
    Ok(file)
}

fn validate(file: &WatchFile) -> Result<(), ConfigError> {
    if file.engine.workers == 0 {
        return Err(ConfigError::InvalidConfig(
            "engine.workers must be at least 1".to_string(),
        ));
    }
    if file.engine.heartbeat_ms == 0 {
        return Err(ConfigError::InvalidConfig(
            "engine.heartbeat_ms must be at least 1".to_string(),
        ));
    }
    if file.engine.queue_capacity == 0 {
        return Err(ConfigError::InvalidConfig(
            "engine.queue_capacity must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for watch in &file.watches {
        if watch.id.is_empty() {
            return Err(ConfigError::MissingField("watch id".to_string()));
        }
        if watch.url.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "url for watch '{}'",
                watch.id
            )));
        }
        if !seen.insert(watch.id.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "duplicate watch id: {}",
                watch.id
            )));
        }
        let method = watch.method.to_uppercase();
        if !ALLOWED_METHODS.contains(&method.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "unsupported method '{}' for watch '{}'",
                watch.method, watch.id
            )));
        }
    }

    Ok(())
}
