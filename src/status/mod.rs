//! Request status tracking.
//!
//! # Responsibilities
//! - Record the lifecycle of every async request, keyed by request id
//! - Enforce primary-key uniqueness on create
//! - Enforce monotonic status transitions on update
//!
//! # Design Decisions
//! - Records are never deleted here; retention belongs to the store
//! - No transaction spans more than one record

pub mod memory;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

pub use memory::MemoryStatusStore;

/// Lifecycle state of an async request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Queued,
    Processing,
    Processed,
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Processing => "processing",
            RequestStatus::Processed => "processed",
            RequestStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Processed | RequestStatus::Failed)
    }

    /// Transitions only move forward: queued → processing → processed|failed,
    /// with queued → processed|failed allowed directly.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, next),
            (Queued, Processing) | (Queued, Processed) | (Queued, Failed)
                | (Processing, Processed) | (Processing, Failed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub id: String,
    pub status: RequestStatus,
    /// Seconds since epoch.
    pub created_at: u64,
    /// Seconds since epoch.
    pub updated_at: u64,
}

impl StatusRecord {
    pub fn new(id: impl Into<String>, status: RequestStatus) -> Self {
        let now = unix_now();
        Self {
            id: id.into(),
            status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn queued(id: impl Into<String>) -> Self {
        Self::new(id, RequestStatus::Queued)
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Capability of an external keyed status store.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Insert a new record. `DuplicateId` when the id exists; the existing
    /// record is left untouched.
    async fn create(&self, record: StatusRecord) -> Result<(), ProxyError>;

    /// `NotFound` when absent.
    async fn get_by_id(&self, id: &str) -> Result<StatusRecord, ProxyError>;

    /// Move a record forward. `NotFound` or `InvalidTransition` otherwise.
    async fn update_status(&self, id: &str, status: RequestStatus) -> Result<StatusRecord, ProxyError>;
}
