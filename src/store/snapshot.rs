use crate::{
    error::AppResult,
    types::{Endpoint, StatusRecord},
};
use std::{
    collections::BTreeMap,
    ffi::OsString,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};

/// Full endpoint → record mapping; the unit of persistence.
pub type StoreSnapshot = BTreeMap<Endpoint, StatusRecord>;

/// The durable copy of a [`StoreSnapshot`].
///
/// Every write replaces the whole file through a temporary sibling and a rename, so a reader
/// sees either the previous snapshot or the new one, never a torn mix.
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the last persisted snapshot.
    ///
    /// Never fails: a missing, unreadable or malformed file yields an empty snapshot.
    pub async fn load(&self) -> StoreSnapshot {
        match self.read().await {
            Ok(Some(snapshot)) => {
                info!(
                    "Loaded previous health status of {} endpoint(s) from {}",
                    snapshot.len(),
                    self.path.display()
                );
                snapshot
            }
            Ok(None) => {
                info!(
                    "No previous health status at {}, starting with a clean state",
                    self.path.display()
                );
                StoreSnapshot::new()
            }
            Err(e) => {
                warn!(
                    "Error reading status file {}, starting with a clean state: {}",
                    self.path.display(),
                    e
                );
                StoreSnapshot::new()
            }
        }
    }

    pub async fn read(&self) -> AppResult<Option<StoreSnapshot>> {
        let data = match fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    pub async fn write(&self, snapshot: &StoreSnapshot) -> AppResult<()> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.tmp_path();

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("health-status"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
