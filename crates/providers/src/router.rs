//! Provider selection from configuration.

use crate::{CredentialRotator, MoondreamProvider};
use optic_core::InferenceProvider;
use optic_core::error::Error;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured inference provider and its credential pool.
///
/// Fails when the provider name is unknown or the pool is empty.
pub fn build_from_config(
    config: &optic_config::AppConfig,
) -> Result<(Arc<dyn InferenceProvider>, CredentialRotator), Error> {
    let timeout = Duration::from_secs(config.polling.request_timeout_secs);
    let inference = &config.inference;

    let provider: Arc<dyn InferenceProvider> = match inference.provider.as_str() {
        "moondream" => Arc::new(MoondreamProvider::new(&inference.api_url, timeout)),
        other => {
            return Err(Error::Config {
                message: format!("Unknown inference provider '{other}'"),
            });
        }
    };

    let rotator = CredentialRotator::new(config.credentials())?;
    tracing::debug!(
        provider = provider.name(),
        pool_size = rotator.len(),
        mode = %inference.credential_mode,
        "Inference provider ready"
    );

    Ok((provider, rotator))
}
