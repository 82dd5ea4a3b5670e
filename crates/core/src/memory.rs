//! Checkpoint store trait: persistence of the resume boundary.
//!
//! The checkpoint is the id of the newest mention whose batch was fully
//! attempted. It is the only state that survives a restart.

use async_trait::async_trait;

use crate::error::CheckpointError;
use crate::mention::MentionId;

/// The core CheckpointStore trait.
///
/// Implementations: plain-text file, in-memory (for testing).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The backend name (e.g., "file", "in_memory").
    fn name(&self) -> &str;

    /// The stored checkpoint, or `None` on first run.
    ///
    /// Never fails: an unreadable record is logged by the implementation and
    /// reported as absent.
    async fn load(&self) -> Option<MentionId>;

    /// Atomically replace the stored checkpoint.
    async fn save(&self, id: &MentionId) -> std::result::Result<(), CheckpointError>;
}
