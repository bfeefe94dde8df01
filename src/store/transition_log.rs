use crate::{error::AppResult, types::TransitionLogEntry};
use std::{
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};

/// Append-only, newline-delimited record of every status change.
#[derive(Debug)]
pub struct TransitionLog {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl TransitionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &TransitionLogEntry) -> AppResult<()> {
        let line = format!("{}\n", entry);

        let _guard = self.append_lock.lock().await;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Raw log content, or `None` when nothing has been recorded yet.
    pub async fn read_raw(&self) -> AppResult<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) if content.is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Parsed entries in append order. Lines that do not parse are skipped.
    pub async fn history(&self) -> AppResult<Vec<TransitionLogEntry>> {
        let Some(content) = self.read_raw().await? else {
            return Ok(Vec::new());
        };

        let entries: Vec<TransitionLogEntry> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(idx, line)| match line.parse::<TransitionLogEntry>() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(
                        "Skipping line {} of {}: {}",
                        idx + 1,
                        self.path.display(),
                        e
                    );
                    None
                }
            })
            .collect();
        Ok(entries)
    }
}
