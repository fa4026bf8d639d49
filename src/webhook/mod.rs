//! HTTP callback contract.
//!
//! A [`WebhookContract`] calls an endpoint when its deadline passes: the
//! "fire this URL if nobody acknowledges in time" use case. Contracts
//! round-trip through the file store; the HTTP client is rebuilt on load.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::config::WatchConfig;
use crate::core::contract::{ActionError, Contract};
use crate::core::types::ContractId;

/// A contract whose timeout action is an HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookContract {
    id: ContractId,
    expires_at: DateTime<Utc>,
    url: String,
    method: String,
    #[serde(skip)]
    client: reqwest::Client,
}

impl WebhookContract {
    /// Create a webhook contract firing a POST to `url` at `expires_at`.
    pub fn new(
        id: impl Into<String>,
        expires_at: DateTime<Utc>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: ContractId::new(id),
            expires_at,
            url: url.into(),
            method: "POST".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Set the HTTP method for the callback.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into().to_uppercase();
        self
    }

    /// Share an existing HTTP client instead of the per-contract default.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build a contract from a watch-file definition.
    pub fn from_config(config: &WatchConfig, client: reqwest::Client) -> Self {
        Self::new(config.id.clone(), config.expires_at, config.url.clone())
            .with_method(config.method.clone())
            .with_client(client)
    }

    /// Endpoint the callback targets.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method of the callback.
    pub fn method(&self) -> &str {
        &self.method
    }
}

#[async_trait]
impl Contract for WebhookContract {
    fn identifier(&self) -> &ContractId {
        &self.id
    }

    fn deadline(&self) -> DateTime<Utc> {
        self.expires_at
    }

    async fn execute_timeout_action(&self) -> Result<(), ActionError> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|_| ActionError::Failed(format!("invalid method: {}", self.method)))?;

        let response = self
            .client
            .request(method, &self.url)
            .send()
            .await
            .map_err(|e| ActionError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Failed(format!(
                "callback to {} returned {}",
                self.url, status
            )));
        }

        tracing::info!(id = %self.id, url = %self.url, "webhook callback delivered");
        Ok(())
    }
}
