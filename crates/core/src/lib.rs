//! # Optic Core
//!
//! Domain types, collaborator traits, and error definitions for the Optic
//! mention bot. This crate has **no I/O dependencies**. It defines the domain
//! model that the adapters and the polling engine are written against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (mention source, reply sink, image download,
//! inference API, checkpoint medium) is a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping adapters via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod credential;
pub mod error;
pub mod event;
pub mod memory;
pub mod mention;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{FetchedImage, ImageFetcher, MentionSource, ReplySink};
pub use credential::Credential;
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use memory::CheckpointStore;
pub use mention::{
    LookupContext, MediaItem, MediaKind, Mention, MentionBatch, MentionId, Receipt, ReplyRequest,
};
pub use provider::{Answer, InferenceProvider};
