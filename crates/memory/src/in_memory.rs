//! In-memory checkpoint store: useful for testing and dry runs.

use async_trait::async_trait;
use optic_core::error::CheckpointError;
use optic_core::memory::CheckpointStore;
use optic_core::mention::MentionId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// A checkpoint held in process memory.
///
/// Can be switched into a failing mode to exercise persistence errors.
pub struct InMemoryCheckpointStore {
    current: Arc<RwLock<Option<MentionId>>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            fail_saves: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    /// Start with an existing checkpoint.
    pub fn seeded(id: impl Into<MentionId>) -> Self {
        Self {
            current: Arc::new(RwLock::new(Some(id.into()))),
            ..Self::new()
        }
    }

    /// Make every subsequent `save` fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self) -> Option<MentionId> {
        self.current.read().await.clone()
    }

    async fn save(&self, id: &MentionId) -> Result<(), CheckpointError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::Persistence(
                "in-memory store is in failing mode".into(),
            ));
        }
        *self.current.write().await = Some(id.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
