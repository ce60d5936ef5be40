//! Error taxonomy shared by the pipeline, the queue and the status store.
//!
//! # Design Decisions
//! - One enum for every layer so rejections (rate limit, open circuit) stay
//!   distinguishable from upstream failures all the way to the HTTP boundary
//! - Retry exhaustion wraps the last error; `root()` looks through it

use crate::status::RequestStatus;

/// Errors produced by the resilient pipeline and the async subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The rate limiter refused the attempt.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The circuit breaker rejected the call without invoking it.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The upstream could not be reached (connect, timeout, body read).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The upstream answered with a non-success status.
    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    /// Every attempt failed; carries the last failure.
    #[error("operation failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ProxyError>,
    },

    /// Queue or status store I/O failure.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Status lookup miss.
    #[error("request {0} not found")]
    NotFound(String),

    /// A status record with this identifier already exists.
    #[error("request {0} already exists")]
    DuplicateId(String),

    /// Attempted to move a status record backwards.
    #[error("invalid status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: RequestStatus,
        to: RequestStatus,
    },

    /// A queue entry could not be encoded or decoded.
    #[error("malformed queue entry: {0}")]
    MalformedEntry(#[from] serde_json::Error),
}

impl ProxyError {
    /// The classifying error, looking through retry exhaustion.
    pub fn root(&self) -> &ProxyError {
        match self {
            ProxyError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// True when the rate limiter caused the failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.root(), ProxyError::RateLimited)
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self.root() {
            ProxyError::RateLimited => "rate_limited",
            ProxyError::CircuitOpen => "circuit_open",
            ProxyError::UpstreamUnavailable(_) => "upstream_unavailable",
            ProxyError::UnexpectedStatus(_) => "unexpected_status",
            ProxyError::RetriesExhausted { .. } => "retries_exhausted",
            ProxyError::StoreUnavailable(_) => "store_unavailable",
            ProxyError::NotFound(_) => "not_found",
            ProxyError::DuplicateId(_) => "duplicate_id",
            ProxyError::InvalidTransition { .. } => "invalid_transition",
            ProxyError::MalformedEntry(_) => "malformed_entry",
        }
    }
}
