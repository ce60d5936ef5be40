//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to upstream (outermost first):
//!     → circuit_breaker.rs (fail fast while open, record outcome)
//!     → retries.rs (repeat failed attempts with backoff.rs delays)
//!     → rate_limit.rs (one token per attempt)
//!     → upstream transport
//! ```
//!
//! # Design Decisions
//! - Limiter and breaker are shared instances passed in explicitly, never globals
//! - Each keeps its mutable state behind a single mutex, never held across an await
//! - Rejections surface as distinct `ProxyError` variants

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;

pub use circuit_breaker::{BreakerSettings, CircuitBreaker, CircuitState, Counts};
pub use rate_limit::RateLimiter;
pub use retries::{retry, RetryPolicy};
