//! In-process list store with optional JSON snapshots.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Notify;

use crate::error::ProxyError;
use crate::queue::ListStore;

/// Named lists kept in memory.
///
/// Pushes wake every waiting pop; each waiter re-checks its list, so a wakeup
/// for another list or a lost race simply goes back to waiting.
#[derive(Debug, Default)]
pub struct MemoryListStore {
    lists: DashMap<String, VecDeque<String>>,
    notify: Notify,
    persistence_path: Option<PathBuf>,
}

impl MemoryListStore {
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
            let lists: HashMap<String, VecDeque<String>> = serde_json::from_reader(reader)?;
            for (name, entries) in lists {
                store.lists.insert(name, entries);
            }
            tracing::info!(path = %path.display(), entries = store.total_len(), "Loaded queue snapshot");
        }
        Ok(store)
    }

    /// Write every list to the persistence path, if one was configured.
    pub fn save_to_file(&self) -> std::io::Result<()> {
        if let Some(path) = &self.persistence_path {
            let lists: HashMap<String, VecDeque<String>> = self
                .lists
                .iter()
                .map(|r| (r.key().clone(), r.value().clone()))
                .collect();

            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer(writer, &lists)?;
            tracing::info!(path = %path.display(), entries = self.total_len(), "Saved queue snapshot");
        }
        Ok(())
    }

    /// Entries currently waiting in `list`.
    pub fn len(&self, list: &str) -> usize {
        self.lists.get(list).map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self, list: &str) -> bool {
        self.len(list) == 0
    }

    fn total_len(&self) -> usize {
        self.lists.iter().map(|r| r.value().len()).sum()
    }

    fn try_pop_right(&self, list: &str) -> Option<String> {
        self.lists
            .get_mut(list)
            .and_then(|mut entries| entries.pop_back())
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn push_left(&self, list: &str, value: String) -> Result<(), ProxyError> {
        self.lists.entry(list.to_string()).or_default().push_front(value);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn pop_right_blocking(&self, list: &str) -> Result<String, ProxyError> {
        loop {
            // Register before checking so a push between the check and the
            // await is not missed.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.try_pop_right(list) {
                return Ok(value);
            }
            notified.await;
        }
    }
}
