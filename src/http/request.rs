//! Request identifiers.
//!
//! # Responsibilities
//! - Generate the id returned to async callers (UUID v4)
//!
//! # Design Decisions
//! - Id generation sits behind a trait so tests can pin the value

use uuid::Uuid;

/// Header carrying the per-request trace id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Source of async request identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Always returns the same identifier.
#[derive(Debug, Clone)]
pub struct FixedIdGenerator(pub String);

impl IdGenerator for FixedIdGenerator {
    fn next_id(&self) -> String {
        self.0.clone()
    }
}
