//! Core identifier types for the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a contract.
///
/// Identifiers are caller-supplied and must be unique among the contracts
/// currently active in an engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractId(String);

impl ContractId {
    /// Create a new ContractId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContractId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContractId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
