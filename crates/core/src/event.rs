//! Domain event system: decoupled observation of the poll loop.
//!
//! The loop publishes an event whenever something interesting happens.
//! Other components (CLI summaries, tests) can subscribe without coupling to
//! the loop's internals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A mention was taken from a fetched batch
    MentionReceived {
        mention_id: String,
        author_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An answer was posted back
    ReplyPosted {
        mention_id: String,
        reply_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A mention was attempted but produced no reply
    MentionSkipped {
        mention_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The stored checkpoint moved forward
    CheckpointAdvanced {
        from: Option<String>,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// The mention source reported quota exhaustion
    RateLimited {
        wait_secs: u64,
        timestamp: DateTime<Utc>,
    },

    /// A fetch failed
    FetchFailed {
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The batch was attempted but the new checkpoint could not be stored
    CheckpointFailed {
        target: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
