//! `optic run`: poll until stopped.

use optic_core::event::{DomainEvent, EventBus};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{GlobalOpts, build_poll_loop, shutdown_signal};

pub async fn run(opts: &GlobalOpts) -> Result<(), Box<dyn std::error::Error>> {
    let config = opts.load_config()?;
    let events = Arc::new(EventBus::default());
    let poll_loop = Arc::new(build_poll_loop(&config, events.clone())?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    // Totals for the shutdown summary; queued events drain before cancellation
    let mut rx = events.subscribe();
    let totals_cancel = cancel.clone();
    let totals = tokio::spawn(async move {
        let (mut replied, mut skipped) = (0u64, 0u64);
        loop {
            tokio::select! {
                biased;
                event = rx.recv() => match event {
                    Ok(event) => match event.as_ref() {
                        DomainEvent::ReplyPosted { .. } => replied += 1,
                        DomainEvent::MentionSkipped { .. } => skipped += 1,
                        _ => {}
                    },
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = totals_cancel.cancelled() => break,
            }
        }
        (replied, skipped)
    });

    println!("🔭 Optic — watching mentions (Ctrl-C to stop)");
    let result = poll_loop.spawn(cancel.clone()).await?;
    cancel.cancel();
    let (replied, skipped) = totals.await?;

    info!(replied, skipped, "Optic stopped");
    println!("   Replied: {replied}  Skipped: {skipped}");
    result?;
    Ok(())
}
