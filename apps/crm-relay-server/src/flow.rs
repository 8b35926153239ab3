//! Outbound JSON POST client for flow endpoints.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::config::FlowTarget;

/// Header carrying the shared key to a flow endpoint.
pub const FLOW_KEY_HEADER: &str = "x-flow-key";

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow call failed: {status} {body}")]
    Status { status: StatusCode, body: String },

    #[error("flow call failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A configured flow endpoint plus the shared HTTP client used to reach it.
#[derive(Debug, Clone)]
pub struct FlowEndpoint {
    client: Client,
    target: FlowTarget,
}

impl FlowEndpoint {
    pub fn new(client: Client, target: FlowTarget) -> Self {
        Self { client, target }
    }

    pub fn target(&self) -> &FlowTarget {
        &self.target
    }

    /// POST `body` as JSON. Anything other than a 2xx status is an error.
    pub async fn post_json<T: Serialize + ?Sized>(&self, body: &T) -> Result<(), FlowError> {
        let mut request = self.client.post(self.target.url.clone()).json(body);
        if let Some(key) = &self.target.shared_key {
            request = request.header(FLOW_KEY_HEADER, key.expose());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Status { status, body });
        }
        Ok(())
    }
}

/// Build the shared outbound client with the configured timeout.
pub fn build_client(timeout: std::time::Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}
