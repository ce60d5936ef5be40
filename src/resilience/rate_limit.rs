//! Token bucket admission control shared by every upstream call.

use std::sync::{Mutex, PoisonError};

use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        self.refill(capacity, refill_rate);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Process-wide admission gate.
///
/// Cloned behind an `Arc` into the synchronous handler and every consumer
/// worker, so both paths draw from the same bucket.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Bucket refilling at `requests_per_second`, holding at most `burst` tokens.
    /// Starts full.
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        let burst = f64::from(burst);
        Self {
            rate: requests_per_second.max(0.0),
            burst,
            bucket: Mutex::new(TokenBucket::new(burst)),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.requests_per_second, config.burst_size)
    }

    /// Take one token if available. Never blocks.
    pub fn allow(&self) -> bool {
        let granted = self
            .bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(self.burst, self.rate);

        if !granted {
            tracing::debug!(rate = self.rate, burst = self.burst, "Rate limit exceeded");
            metrics::record_rate_limited();
        }
        granted
    }

    /// Tokens currently available, after refill.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.refill(self.burst, self.rate);
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_refill() {
        let limiter = RateLimiter::new(4.0, 3);

        for _ in 0..3 {
            assert!(limiter.allow());
        }
        assert!(!limiter.allow());

        // 1/R seconds buys exactly one token.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_capped_at_burst() {
        let limiter = RateLimiter::new(10.0, 2);
        assert!(limiter.allow());
        assert!(limiter.allow());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(limiter.available(), 2.0);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn test_concurrent_callers_never_overspend() {
        let limiter = Arc::new(RateLimiter::new(1e-9, 100));
        let granted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let granted = granted.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if limiter.allow() {
                            granted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), 100);
        assert!(limiter.available() >= 0.0);
    }
}
