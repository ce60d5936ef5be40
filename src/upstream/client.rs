//! Resilient upstream client.
//!
//! # Responsibilities
//! - Compose breaker, retry and limiter around one upstream GET
//! - Classify non-2xx answers as `UnexpectedStatus`, distinct from transport errors
//!
//! # Design Decisions
//! - Breaker outermost: one breaker outcome per call, not per attempt
//! - Limiter innermost: every attempt, retries included, spends a token
//! - The limiter and breaker are shared handles so sync and async traffic
//!   draw on the same admission budget and circuit

use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::resilience::{retry, CircuitBreaker, CircuitState, RateLimiter, RetryPolicy};
use crate::upstream::UpstreamTransport;

/// Upstream client guarded by rate limiting, retries and a circuit breaker.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn UpstreamTransport>,
    limiter: Arc<RateLimiter>,
    breaker: Arc<CircuitBreaker>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        limiter: Arc<RateLimiter>,
        breaker: Arc<CircuitBreaker>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            limiter,
            breaker,
            policy,
        }
    }

    /// Build the limiter and breaker from config around `transport`.
    pub fn from_config(config: &ProxyConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        Self::new(
            transport,
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
            Arc::new(CircuitBreaker::from_config(&config.circuit_breaker)),
            RetryPolicy::from(&config.retries),
        )
    }

    /// Fetch `target`, returning the response body on a 2xx answer.
    ///
    /// Failures keep their classification under `ProxyError::root()`:
    /// `RateLimited`, `UnexpectedStatus`, `CircuitOpen` or `UpstreamUnavailable`.
    pub async fn get(&self, target: &str) -> Result<String, ProxyError> {
        self.breaker
            .execute(|| retry(&self.policy, || self.attempt(target)))
            .await
    }

    async fn attempt(&self, target: &str) -> Result<String, ProxyError> {
        if !self.limiter.allow() {
            return Err(ProxyError::RateLimited);
        }

        let response = self.transport.get(target).await?;
        if !response.is_success() {
            tracing::warn!(url = target, status = response.status, "Unexpected upstream status");
            return Err(ProxyError::UnexpectedStatus(response.status));
        }
        Ok(response.body)
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}
