//! File-based checkpoint store: one id in a plain text file.
//!
//! The file holds nothing but the decimal id, optionally followed by a
//! newline, so it can be inspected or seeded by hand.
//!
//! Storage location: `~/.optic/last_seen_id.txt` unless configured.

use async_trait::async_trait;
use optic_core::error::CheckpointError;
use optic_core::memory::CheckpointStore;
use optic_core::mention::MentionId;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// A checkpoint persisted to a single file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves either the old id or the new one, never a torn file.
pub struct FileCheckpointStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Parse file contents into an id. Blank content means no checkpoint.
///
/// A leading byte-order mark is ignored. Anything other than decimal digits
/// is rejected and handed back for logging.
fn parse_checkpoint(content: &str) -> Result<Option<MentionId>, &str> {
    let trimmed = content.trim().trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        Ok(None)
    } else if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        Ok(Some(MentionId::new(trimmed)))
    } else {
        Err(trimmed)
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self) -> Option<MentionId> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => match parse_checkpoint(&content) {
                Ok(id) => {
                    debug!(path = %self.path.display(), checkpoint = ?id, "Checkpoint loaded");
                    id
                }
                Err(garbage) => {
                    warn!(
                        path = %self.path.display(),
                        content = ?garbage,
                        "Checkpoint is not a numeric id, treating as absent"
                    );
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No checkpoint file, starting fresh");
                None
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Checkpoint unreadable, treating as absent"
                );
                None
            }
        }
    }

    async fn save(&self, id: &MentionId) -> Result<(), CheckpointError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                CheckpointError::Persistence(format!(
                    "Failed to create checkpoint directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, format!("{id}\n"))
            .await
            .map_err(|e| {
                CheckpointError::Persistence(format!("Failed to write {}: {e}", tmp.display()))
            })?;

        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            CheckpointError::Persistence(format!(
                "Failed to move checkpoint into {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(path = %self.path.display(), checkpoint = %id, "Checkpoint saved");
        Ok(())
    }
}
