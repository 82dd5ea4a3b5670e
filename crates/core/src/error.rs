//! Error types for the Optic domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only [`FetchError`] and
//! [`CheckpointError`] are ever visible to the poll loop. Everything that can
//! go wrong while handling one mention collapses into [`ProcessingError`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The top-level error type for Optic operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Mention source errors ---
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    // --- Reply sink errors ---
    #[error("Reply error: {0}")]
    Reply(#[from] ReplyError),

    // --- Image download errors ---
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    // --- Inference errors ---
    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    // --- Checkpoint errors ---
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    // --- Credential errors ---
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Outcome of a failed mention fetch, as classified by the source adapter.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Quota exhausted. `reset_at` is when the window reopens, if the API said so.
    #[error("Rate limited by mention source{}", reset_suffix(.reset_at))]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// Network failure, server error, malformed response. Retry later.
    #[error("Transient fetch failure: {0}")]
    Transient(String),

    /// The request can never succeed as configured (bad credentials, bad account).
    #[error("Fatal fetch failure: {0}")]
    Fatal(String),
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(", resets at {}", at.to_rfc3339()),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReplyError {
    #[error("Reply rejected: {message} (status: {status_code})")]
    Rejected { status_code: u16, message: String },

    #[error("Rate limited while replying")]
    RateLimited,

    #[error("Reply timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("Image download returned status {0}")]
    Status(u16),

    #[error("Image is too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Image download timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("Inference API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by inference API")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("Inference timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint storage is not writable: {0}")]
    Persistence(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// Every credential in the pool was rejected within one traversal.
    #[error("No valid credential after trying all {attempts} pool members")]
    NoValidCredential { attempts: usize },

    #[error("Credential pool is empty")]
    EmptyPool,
}

/// Why a single mention was skipped. This is the closed set of soft-skip
/// reasons; none of them stops the batch.
#[derive(Debug, Clone, Error)]
pub enum ProcessingError {
    #[error("no media attachment matched the mention")]
    NoAttachment,

    #[error("attachment {media_key} is a {kind}, not a photo")]
    NotAPhoto { media_key: String, kind: String },

    #[error("photo {media_key} has no URL")]
    MissingMediaUrl { media_key: String },

    #[error("image unavailable: {0}")]
    ImageUnavailable(#[source] ImageError),

    #[error("inference failed: {0}")]
    InferenceFailed(#[source] InferenceError),

    #[error(transparent)]
    NoValidCredential(#[from] CredentialError),

    #[error("reply failed: {0}")]
    ReplyFailed(#[source] ReplyError),
}

impl ProcessingError {
    /// Short machine-friendly label, used in logs and events.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoAttachment => "no_attachment",
            Self::NotAPhoto { .. } => "not_a_photo",
            Self::MissingMediaUrl { .. } => "missing_media_url",
            Self::ImageUnavailable(_) => "image_unavailable",
            Self::InferenceFailed(_) => "inference_failed",
            Self::NoValidCredential(_) => "no_valid_credential",
            Self::ReplyFailed(_) => "reply_failed",
        }
    }
}
