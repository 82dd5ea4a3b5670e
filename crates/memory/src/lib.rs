//! Checkpoint store implementations for Optic.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::FileCheckpointStore;
pub use in_memory::InMemoryCheckpointStore;
