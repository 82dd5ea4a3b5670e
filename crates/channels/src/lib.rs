//! Platform adapters for Optic.
//!
//! Each adapter implements one of the collaborator traits from `optic-core`:
//! - **Twitter**: mention source and reply sink over the Twitter API v2
//! - **Image**: attachment download over plain HTTP

pub mod image;
pub mod twitter;

pub use image::HttpImageFetcher;
pub use twitter::TwitterClient;
