//! HTTP boundary.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → handlers.rs
//!         /proxy         → ResilientClient
//!         /async-proxy   → StatusStore (queued) → Queue
//!         /requests/{id} → StatusStore
//!     → response.rs (error → status code + JSON body)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{FixedIdGenerator, IdGenerator, UuidGenerator, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
