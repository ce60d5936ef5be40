//! In-process status store with optional JSON snapshots.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::ProxyError;
use crate::status::{unix_now, RequestStatus, StatusRecord, StatusStore};

/// Status table held in a concurrent map.
#[derive(Debug, Default, Clone)]
pub struct MemoryStatusStore {
    records: Arc<DashMap<String, StatusRecord>>,
    persistence_path: Option<PathBuf>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from file if it exists; later `save_to_file` calls write back to it.
    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let store = Self {
            persistence_path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let records: HashMap<String, StatusRecord> = serde_json::from_reader(reader)?;
            for (id, record) in records {
                store.records.insert(id, record);
            }
            tracing::info!(path = %path.display(), records = store.count(), "Loaded status snapshot");
        }
        Ok(store)
    }

    pub fn save_to_file(&self) -> std::io::Result<()> {
        if let Some(path) = &self.persistence_path {
            let records: HashMap<_, _> = self
                .records
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();

            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(writer, &records)?;
            tracing::info!(path = %path.display(), records = records.len(), "Saved status snapshot");
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn create(&self, record: StatusRecord) -> Result<(), ProxyError> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(_) => Err(ProxyError::DuplicateId(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<StatusRecord, ProxyError> {
        self.records
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| ProxyError::NotFound(id.to_string()))
    }

    async fn update_status(&self, id: &str, status: RequestStatus) -> Result<StatusRecord, ProxyError> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| ProxyError::NotFound(id.to_string()))?;

        if !record.status.can_transition_to(status) {
            return Err(ProxyError::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        record.updated_at = unix_now();
        Ok(record.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_get() {
        let store = MemoryStatusStore::new();
        store.create(StatusRecord::queued("abc123")).await.unwrap();

        let record = store.get_by_id("abc123").await.unwrap();
        assert_eq!(record.status, RequestStatus::Queued);
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_leaves_record_untouched() {
        let store = MemoryStatusStore::new();
        store.create(StatusRecord::queued("dup")).await.unwrap();
        store.update_status("dup", RequestStatus::Processing).await.unwrap();
        let before = store.get_by_id("dup").await.unwrap();

        let err = store
            .create(StatusRecord::new("dup", RequestStatus::Failed))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::DuplicateId(ref id) if id == "dup"));
        assert_eq!(store.get_by_id("dup").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_missing_record() {
        let store = MemoryStatusStore::new();
        assert!(matches!(store.get_by_id("nope").await, Err(ProxyError::NotFound(_))));
        assert!(matches!(
            store.update_status("nope", RequestStatus::Processed).await,
            Err(ProxyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_backwards_move() {
        let store = MemoryStatusStore::new();
        store.create(StatusRecord::queued("r")).await.unwrap();
        store.update_status("r", RequestStatus::Processed).await.unwrap();

        let err = store.update_status("r", RequestStatus::Queued).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::InvalidTransition { from: RequestStatus::Processed, to: RequestStatus::Queued, .. }
        ));
        assert_eq!(store.get_by_id("r").await.unwrap().status, RequestStatus::Processed);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");

        let store = MemoryStatusStore::load_from_file(&path).unwrap();
        store.create(StatusRecord::queued("kept")).await.unwrap();
        store.save_to_file().unwrap();

        let restored = MemoryStatusStore::load_from_file(&path).unwrap();
        assert_eq!(restored.get_by_id("kept").await.unwrap().status, RequestStatus::Queued);
    }
}
