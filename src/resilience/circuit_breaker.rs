//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures since the last reset > failure_threshold
//! Open → Half-Open: after open_timeout
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - One breaker shared by the sync path and every consumer worker
//! - Fail fast in Open state (operation is never invoked)
//! - Counters reset on every state change and, while Closed, when the breaker
//!   is consulted `interval` after the last recorded failure
//! - An outcome is dropped only when the state changed while the call ran;
//!   a slow failure still counts after a Closed-state reset
//! - Half-Open admits at most `max_probe_requests` probes

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::error::ProxyError;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Calls admitted; bounds the Half-Open probes.
    pub requests: u32,
    pub total_successes: u32,
    /// Compared against `failure_threshold`.
    pub total_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Trip once failures since the last reset exceed this.
    pub failure_threshold: u32,
    /// Failure-free time after which Closed counters reset. Zero keeps them
    /// until a transition.
    pub interval: Duration,
    /// Time spent Open before probing.
    pub open_timeout: Duration,
    /// Probes admitted while Half-Open.
    pub max_probe_requests: u32,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            interval: config.interval(),
            open_timeout: config.open_timeout(),
            max_probe_requests: config.max_probe_requests.max(1),
        }
    }
}

/// State that follows a recorded outcome.
fn next_state(state: CircuitState, succeeded: bool, counts: &Counts, settings: &BreakerSettings) -> CircuitState {
    match (state, succeeded) {
        (CircuitState::Closed, false) if counts.total_failures > settings.failure_threshold => {
            CircuitState::Open
        }
        (CircuitState::HalfOpen, true) => CircuitState::Closed,
        (CircuitState::HalfOpen, false) => CircuitState::Open,
        (state, _) => state,
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    /// Bumped on every state change, never on a Closed-state reset.
    epoch: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

impl Inner {
    fn new(settings: &BreakerSettings, now: Instant) -> Self {
        let mut inner = Self {
            state: CircuitState::Closed,
            epoch: 0,
            counts: Counts::default(),
            expiry: None,
        };
        inner.reset(settings, now);
        inner
    }

    /// Apply time-driven transitions and return the resulting state.
    fn current_state(&mut self, settings: &BreakerSettings, now: Instant) -> CircuitState {
        let expired = self.expiry.is_some_and(|expiry| expiry <= now);
        match self.state {
            CircuitState::Closed if expired => self.reset(settings, now),
            CircuitState::Open if expired => self.set_state(CircuitState::HalfOpen, settings, now),
            _ => {}
        }
        self.state
    }

    fn record(&mut self, succeeded: bool, settings: &BreakerSettings, now: Instant) {
        if succeeded {
            self.counts.on_success();
        } else {
            self.counts.on_failure();
            if self.state == CircuitState::Closed && !settings.interval.is_zero() {
                self.expiry = Some(now + settings.interval);
            }
        }
    }

    fn set_state(&mut self, state: CircuitState, settings: &BreakerSettings, now: Instant) {
        if self.state == state {
            return;
        }
        let previous = self.state;
        self.state = state;
        self.epoch = self.epoch.wrapping_add(1);
        self.reset(settings, now);

        match state {
            CircuitState::Open => tracing::warn!(from = %previous, to = %state, "Circuit breaker opened"),
            _ => tracing::info!(from = %previous, to = %state, "Circuit breaker state changed"),
        }
        metrics::record_circuit_transition(previous.as_str(), state.as_str());
    }

    fn reset(&mut self, settings: &BreakerSettings, now: Instant) {
        self.counts = Counts::default();
        self.expiry = match self.state {
            CircuitState::Closed if settings.interval.is_zero() => None,
            CircuitState::Closed => Some(now + settings.interval),
            CircuitState::Open => Some(now + settings.open_timeout),
            CircuitState::HalfOpen => None,
        };
    }
}

/// Three-state circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        let inner = Inner::new(&settings, Instant::now());
        Self {
            settings,
            inner: Mutex::new(inner),
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(BreakerSettings::from(config))
    }

    /// Current state, after applying any elapsed timeout.
    pub fn state(&self) -> CircuitState {
        self.lock().current_state(&self.settings, Instant::now())
    }

    /// Counters since the last reset.
    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        inner.current_state(&self.settings, Instant::now());
        inner.counts
    }

    /// Run `operation` through the breaker.
    ///
    /// Returns `ProxyError::CircuitOpen` without invoking it when the circuit is
    /// open or the half-open probe quota is used up. Otherwise the operation's
    /// own result is returned unchanged and its outcome recorded.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ProxyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ProxyError>>,
    {
        let mut permit = self.before_request()?;
        let result = operation().await;
        permit.complete(result.is_ok());
        result
    }

    fn before_request(&self) -> Result<Permit<'_>, ProxyError> {
        let mut inner = self.lock();
        let state = inner.current_state(&self.settings, Instant::now());

        let rejected = match state {
            CircuitState::Open => true,
            CircuitState::HalfOpen => inner.counts.requests >= self.settings.max_probe_requests,
            CircuitState::Closed => false,
        };
        if rejected {
            tracing::debug!(state = %state, "Circuit breaker rejected request");
            return Err(ProxyError::CircuitOpen);
        }

        inner.counts.on_request();
        Ok(Permit {
            breaker: self,
            epoch: inner.epoch,
            done: false,
        })
    }

    fn after_request(&self, epoch: u64, succeeded: bool) {
        let now = Instant::now();
        let mut inner = self.lock();
        // Calls are only admitted while Closed or Half-Open, and leaving
        // either bumps the epoch. No reset here: a call slower than
        // `interval` must still land in the counters.
        if inner.epoch != epoch {
            return;
        }
        let state = inner.state;

        inner.record(succeeded, &self.settings, now);
        let next = next_state(state, succeeded, &inner.counts, &self.settings);
        inner.set_state(next, &self.settings, now);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An admitted call. Dropping it without completing (cancelled future)
/// counts as a failure so a half-open probe slot is never leaked.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    epoch: u64,
    done: bool,
}

impl Permit<'_> {
    fn complete(&mut self, succeeded: bool) {
        self.done = true;
        self.breaker.after_request(self.epoch, succeeded);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.breaker.after_request(self.epoch, false);
        }
    }
}
