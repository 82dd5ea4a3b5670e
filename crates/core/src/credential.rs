//! Inference API credentials.

use serde::{Deserialize, Serialize};

/// An opaque inference-API secret.
///
/// `Debug` and `Display` never print the secret; use [`Credential::fingerprint`]
/// in logs and [`Credential::expose`] only at the HTTP boundary.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A short, log-safe identifier: the first four characters and an ellipsis.
    pub fn fingerprint(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…")
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.fingerprint())
    }
}
