use crate::types::{Endpoint, StatusRecord};
use std::collections::HashSet;
use tokio::sync::{Mutex, RwLock};

mod snapshot;
mod transition_log;

pub use snapshot::{SnapshotFile, StoreSnapshot};
pub use transition_log::TransitionLog;

/// In-memory table of the latest [`StatusRecord`] per endpoint, mirrored to a [`SnapshotFile`].
///
/// Memory is the source of truth for the running process; the file only serves restarts, so a
/// failed write is logged and the in-memory update stands.
#[derive(Debug)]
pub struct StatusStore {
    records: RwLock<StoreSnapshot>,
    file: SnapshotFile,
    // Held across update + persist so files land in the same order as updates.
    persist_lock: Mutex<()>,
}

impl StatusStore {
    #[cfg(test)]
    pub fn new(file: SnapshotFile) -> Self {
        Self::with_snapshot(file, StoreSnapshot::new())
    }

    pub fn with_snapshot(file: SnapshotFile, snapshot: StoreSnapshot) -> Self {
        Self {
            records: RwLock::new(snapshot),
            file,
            persist_lock: Mutex::new(()),
        }
    }

    /// Rebuild the store from its file, keeping only records of `endpoints`.
    pub async fn open(file: SnapshotFile, endpoints: &[Endpoint]) -> Self {
        let mut snapshot = file.load().await;

        let configured: HashSet<&Endpoint> = endpoints.iter().collect();
        let before = snapshot.len();
        snapshot.retain(|endpoint, _| configured.contains(endpoint));
        if snapshot.len() != before {
            info!(
                "Dropped {} stored record(s) of endpoints that are no longer configured",
                before - snapshot.len()
            );
        }

        Self::with_snapshot(file, snapshot)
    }

    pub async fn get(&self, endpoint: &Endpoint) -> Option<StatusRecord> {
        self.records.read().await.get(endpoint).cloned()
    }

    /// Copy of the whole table as of the last completed [`update`](Self::update).
    pub async fn snapshot(&self) -> StoreSnapshot {
        self.records.read().await.clone()
    }

    /// Replace the record of `endpoint` and persist the full table.
    ///
    /// Returns the record it replaced.
    pub async fn update(&self, endpoint: &Endpoint, record: StatusRecord) -> Option<StatusRecord> {
        let _persist_guard = self.persist_lock.lock().await;

        let (previous, snapshot) = {
            let mut records = self.records.write().await;
            let previous = records.insert(endpoint.clone(), record);
            (previous, records.clone())
        };

        if let Err(e) = self.file.write(&snapshot).await {
            error!(
                "Failed to write status to {}: {}",
                self.file.path().display(),
                e
            );
        }

        previous
    }
}
