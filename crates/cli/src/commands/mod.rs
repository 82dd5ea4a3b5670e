//! CLI command implementations and shared wiring.

pub mod config_cmd;
pub mod doctor;
pub mod once;
pub mod onboard;
pub mod run;
pub mod status;

use optic_agent::MentionProcessor;
use optic_channels::{HttpImageFetcher, TwitterClient};
use optic_config::AppConfig;
use optic_core::event::EventBus;
use optic_memory::FileCheckpointStore;
use optic_workflow::PollLoop;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Options shared by every command.
pub struct GlobalOpts {
    pub config_path: PathBuf,
    pub json: bool,
}

impl GlobalOpts {
    /// Load the config file plus environment overrides.
    pub fn load_config(&self) -> Result<AppConfig, Box<dyn std::error::Error>> {
        AppConfig::load_path(&self.config_path)
            .map_err(|e| format!("Failed to load config: {e}").into())
    }
}

/// Wire the Twitter client, image fetcher, inference provider and file
/// checkpoint into a poll loop.
pub fn build_poll_loop(
    config: &AppConfig,
    events: Arc<EventBus>,
) -> Result<PollLoop, Box<dyn std::error::Error>> {
    config.require_runtime()?;

    let twitter = Arc::new(TwitterClient::from_config(config)?);
    let images = Arc::new(HttpImageFetcher::from_config(config));
    let (provider, rotator) = optic_providers::build_from_config(config)?;

    let processor = MentionProcessor::new(
        images,
        provider,
        twitter.clone(),
        rotator,
        config.account.bare_handle(),
    )
    .configured(config);

    let store = Arc::new(FileCheckpointStore::new(config.checkpoint.resolved_path()));
    info!(
        account_id = %config.account.user_id,
        handle = %config.account.bare_handle(),
        checkpoint = %store.path().display(),
        credentials = config.inference.api_keys.len(),
        mode = %config.inference.credential_mode,
        "Optic configured"
    );

    Ok(PollLoop::new(twitter, processor, store, &config.account.user_id)
        .configured(config)
        .with_events(events))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
