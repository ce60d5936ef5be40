//! Resilient proxy library: a rate-limited, retrying, circuit-broken client
//! for one unreliable upstream, plus a queue-backed async path.

pub mod config;
pub mod consumer;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod queue;
pub mod resilience;
pub mod status;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use upstream::ResilientClient;
