//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, at least one attempt and one worker)
//! - Check addresses and the upstream target parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.target: invalid URL {0:?}")]
    InvalidTarget(String),

    #[error("{field}: must be greater than zero")]
    MustBePositive { field: &'static str },
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    match url::Url::parse(&config.upstream.target) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidTarget(config.upstream.target.clone())),
    }

    let positive = [
        ("timeouts.request_secs", config.timeouts.request_secs > 0),
        ("upstream.request_timeout_secs", config.upstream.request_timeout_secs > 0),
        ("rate_limit.requests_per_second", config.rate_limit.requests_per_second > 0.0),
        ("rate_limit.burst_size", config.rate_limit.burst_size > 0),
        ("circuit_breaker.max_probe_requests", config.circuit_breaker.max_probe_requests > 0),
        ("retries.max_attempts", config.retries.max_attempts > 0),
        ("consumer.workers", config.consumer.workers > 0),
    ];
    for (field, ok) in positive {
        if !ok {
            errors.push(ValidationError::MustBePositive { field });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
