use crate::config::{TriggerConfig, UpdateRequest};
use crate::core::TriggerError;
use anyhow::{Context, Result};
use reqwest::{Client, Response};
use tracing::debug;

/// Shared HTTP access to the update server.
///
/// Wraps a single [`reqwest::Client`] so connection settings (user agent and the
/// connect and read timeouts) are configured once per run. Cloning is cheap and shares the
/// connection pool.
#[derive(Debug, Clone)]
pub struct UpdateClient {
    http: Client,
}

impl UpdateClient {
    /// Builds a client from the run configuration.
    pub fn new(config: &TriggerConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }
        // Bounds each wait for headers or the next chunk, not the whole download
        if let Some(timeout) = config.read_timeout() {
            builder = builder.read_timeout(timeout);
        }
        let http = builder.build().map_err(|e| TriggerError::Network {
            operation: "building HTTP client".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { http })
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Issues `GET {base_url}/{name}`.
    ///
    /// Only transport failures are errors; any HTTP status is returned to the caller
    /// to interpret.
    pub async fn get(&self, request: &UpdateRequest, name: &str) -> Result<Response> {
        let url = request.url_for(name);
        debug!("GET {}", url);
        self.http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))
    }
}
