//! Inference provider trait: the abstraction over vision-language backends.
//!
//! A provider takes an image and a question and returns a text answer. The
//! credential is passed per call so the caller decides rotation, not the
//! provider.
//!
//! Implementations: Moondream cloud API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::channel::FetchedImage;
use crate::credential::Credential;
use crate::error::InferenceError;

/// A generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
}

impl Answer {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

/// The core InferenceProvider trait.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "moondream").
    fn name(&self) -> &str;

    /// Ask `prompt` about `image` using `credential`.
    async fn query(
        &self,
        image: &FetchedImage,
        prompt: &str,
        credential: &Credential,
    ) -> std::result::Result<Answer, InferenceError>;

    /// Check that `credential` is accepted.
    ///
    /// Default implementation accepts every non-blank credential without a
    /// network call. Providers that override this may spend a billable request.
    async fn probe(&self, credential: &Credential) -> std::result::Result<(), InferenceError> {
        if credential.is_blank() {
            return Err(InferenceError::AuthenticationFailed(
                "blank credential".into(),
            ));
        }
        Ok(())
    }
}
