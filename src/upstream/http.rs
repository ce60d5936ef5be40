//! `reqwest`-backed transport.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::upstream::{UpstreamResponse, UpstreamTransport};

/// HTTP transport with per-attempt timeouts.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn get(&self, target: &str) -> Result<UpstreamResponse, ProxyError> {
        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::UpstreamUnavailable(e.to_string()))?;

        tracing::debug!(url = target, status, bytes = body.len(), "Upstream responded");
        Ok(UpstreamResponse { status, body })
    }
}
