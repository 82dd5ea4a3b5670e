//! Inference provider implementations for Optic.
//!
//! All providers implement the `optic_core::InferenceProvider` trait.
//! The credential pool they are called with is managed by [`CredentialRotator`].

pub mod moondream;
pub mod rotator;
pub mod router;

pub use moondream::MoondreamProvider;
pub use rotator::CredentialRotator;
pub use router::build_from_config;
