//! Upstream access.
//!
//! # Data Flow
//! ```text
//! sync handler / consumer worker
//!     → client.rs (ResilientClient: breaker → retry → limiter)
//!     → UpstreamTransport (http.rs in production, scripted mocks in tests)
//! ```
//!
//! # Design Decisions
//! - The transport only reports what happened; status classification lives
//!   in the client so every transport gets the same semantics
//! - Transport failures map to `UpstreamUnavailable`, never to a status code

pub mod client;
pub mod http;

use async_trait::async_trait;

use crate::error::ProxyError;

pub use client::ResilientClient;
pub use http::HttpTransport;

/// Raw upstream answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to perform one GET against the upstream.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// One attempt. Errors are transport-level only.
    async fn get(&self, target: &str) -> Result<UpstreamResponse, ProxyError>;
}
