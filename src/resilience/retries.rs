//! Retry logic.
//!
//! # Responsibilities
//! - Run an operation up to `max_attempts` times, sequentially
//! - Sleep the exponential backoff between attempts, never after the last
//! - Wrap the final failure with the attempt count
//!
//! # Design Decisions
//! - Every failure is retried the same way, admission rejections included
//! - The sleep suspends only the calling task; shared limiter/breaker state
//!   is never held across it

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

/// Retry parameters for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy with the given attempts and base delay, no cap, no jitter.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay_ms: base_delay.as_millis() as u64,
            max_delay_ms: u64::MAX,
            jitter: false,
        }
    }

    /// Delay before attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms, self.jitter)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            jitter: config.jitter,
        }
    }
}

/// Invoke `operation` until it succeeds or `policy.max_attempts` is reached.
///
/// A policy of zero attempts still runs the operation once.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, ProxyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProxyError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    tracing::warn!(attempts = attempt, error = %err, "Retries exhausted");
                    return Err(ProxyError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }

                let delay = policy.delay_for(attempt);
                tracing::info!(attempt, delay = ?delay, error = %err, "Retrying operation");
                metrics::record_retry(err.kind());
                tokio::time::sleep(delay).await;
            }
        }
    }
}
