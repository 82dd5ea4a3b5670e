//! The poll loop state machine.

use chrono::Utc;
use optic_agent::MentionProcessor;
use optic_config::AppConfig;
use optic_core::error::{Error, FetchError};
use optic_core::event::{DomainEvent, EventBus};
use optic_core::memory::CheckpointStore;
use optic_core::mention::{MentionBatch, MentionId};
use optic_core::MentionSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::clock::{Clock, SystemClock};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Fetching,
    ProcessingBatch,
    AdvancingCheckpoint,
    RateLimited,
    Error,
    Sleeping,
    Stopped,
}

/// How one cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum CycleOutcome {
    /// A non-empty batch was attempted and the checkpoint is current
    Processed,
    /// Nothing new
    Empty,
    /// The source asked us to back off
    RateLimited,
    /// Network, server or decode failure; retried after the error backoff
    FetchFailed(String),
    /// The batch was attempted but the checkpoint could not be written
    PersistenceFailed(String),
    /// The source rejected the request in a way retrying cannot fix
    Fatal(String),
}

/// Summary of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub fetched: usize,
    pub replied: usize,
    pub skipped: usize,
    /// Stored checkpoint after the cycle
    pub checkpoint: Option<MentionId>,
    #[serde(rename = "next_wait_secs", serialize_with = "serialize_secs")]
    pub next_wait: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

impl CycleReport {
    fn new(outcome: CycleOutcome, checkpoint: Option<MentionId>, next_wait: Duration) -> Self {
        Self {
            outcome,
            fetched: 0,
            replied: 0,
            skipped: 0,
            checkpoint,
            next_wait,
        }
    }
}

/// Fetch → process → checkpoint → sleep, until cancelled.
///
/// The checkpoint is owned here: it is read at the start of each cycle and
/// written only after every mention in the batch has been attempted.
pub struct PollLoop {
    source: Arc<dyn MentionSource>,
    processor: MentionProcessor,
    checkpoint: Arc<dyn CheckpointStore>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    account_id: String,
    page_size: u32,
    interval: Duration,
    error_backoff: Duration,
    rate_limit_fallback: Duration,
    request_timeout: Duration,
    state: watch::Sender<LoopState>,
}

impl PollLoop {
    pub fn new(
        source: Arc<dyn MentionSource>,
        processor: MentionProcessor,
        checkpoint: Arc<dyn CheckpointStore>,
        account_id: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            source,
            processor,
            checkpoint,
            events: Arc::new(EventBus::default()),
            clock: Arc::new(SystemClock),
            account_id: account_id.into(),
            page_size: 10,
            interval: Duration::from_secs(60),
            error_backoff: Duration::from_secs(30),
            rate_limit_fallback: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            state,
        }
    }

    /// Apply account id, page size and timing from `config`.
    pub fn configured(mut self, config: &AppConfig) -> Self {
        let p = &config.polling;
        self.account_id = config.account.user_id.clone();
        self.page_size = p.page_size;
        self.interval = Duration::from_secs(p.interval_secs);
        self.error_backoff = Duration::from_secs(p.error_backoff_secs);
        self.rate_limit_fallback = Duration::from_secs(p.rate_limit_fallback_secs);
        self.request_timeout = Duration::from_secs(p.request_timeout_secs);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Nominal interval, error backoff and rate-limit fallback.
    pub fn with_timing(mut self, interval: Duration, error_backoff: Duration, fallback: Duration) -> Self {
        self.interval = interval;
        self.error_backoff = error_backoff;
        self.rate_limit_fallback = fallback;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LoopState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = ?prev, to = ?next, "Loop state");
        }
    }

    /// Run cycles until `cancel` fires or a fatal fetch error occurs.
    ///
    /// Cancellation is observed between cycles and during the sleep; an
    /// in-flight cycle always finishes.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), Error> {
        info!(
            account_id = %self.account_id,
            interval_secs = self.interval.as_secs(),
            source = self.source.name(),
            checkpoint_store = self.checkpoint.name(),
            "Poll loop started"
        );

        while !cancel.is_cancelled() {
            let report = self.run_once().await;

            if let CycleOutcome::Fatal(message) = report.outcome {
                self.transition(LoopState::Stopped);
                return Err(Error::Fetch(FetchError::Fatal(message)));
            }

            self.transition(LoopState::Sleeping);
            debug!(wait_secs = report.next_wait.as_secs(), "Sleeping");
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(report.next_wait) => {}
            }
            self.transition(LoopState::Idle);
        }

        info!("Poll loop stopped");
        self.transition(LoopState::Stopped);
        Ok(())
    }

    /// Run [`PollLoop::run`] on a background task.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> tokio::task::JoinHandle<Result<(), Error>> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    /// Run exactly one cycle and report what happened. Does not sleep.
    pub async fn run_once(&self) -> CycleReport {
        let span = info_span!("cycle", cycle_id = %uuid::Uuid::new_v4());
        self.cycle().instrument(span).await
    }

    async fn cycle(&self) -> CycleReport {
        self.transition(LoopState::Fetching);
        let since = self.checkpoint.load().await;

        let fetched = tokio::time::timeout(
            self.request_timeout,
            self.source
                .fetch_mentions(&self.account_id, since.as_ref(), self.page_size),
        )
        .await
        .unwrap_or_else(|_| {
            Err(FetchError::Transient(format!(
                "fetch timed out after {}s",
                self.request_timeout.as_secs()
            )))
        });

        match fetched {
            Ok(batch) if batch.is_empty() => {
                debug!(since = ?since, "No new mentions");
                CycleReport::new(CycleOutcome::Empty, since, self.interval)
            }
            Ok(batch) => self.process_batch(batch, since).await,
            Err(FetchError::RateLimited { reset_at }) => {
                self.transition(LoopState::RateLimited);
                let wait = match reset_at {
                    Some(reset) => (reset - self.clock.now()).to_std().unwrap_or(Duration::ZERO),
                    None => self.rate_limit_fallback,
                };
                warn!(wait_secs = wait.as_secs(), reset_at = ?reset_at, "Rate limited by mention source");
                self.events.publish(DomainEvent::RateLimited {
                    wait_secs: wait.as_secs(),
                    timestamp: Utc::now(),
                });
                CycleReport::new(CycleOutcome::RateLimited, since, wait)
            }
            Err(FetchError::Transient(message)) => {
                self.transition(LoopState::Error);
                warn!(error = %message, backoff_secs = self.error_backoff.as_secs(), "Fetch failed");
                self.events.publish(DomainEvent::FetchFailed {
                    error_message: message.clone(),
                    timestamp: Utc::now(),
                });
                CycleReport::new(CycleOutcome::FetchFailed(message), since, self.error_backoff)
            }
            Err(FetchError::Fatal(message)) => {
                self.transition(LoopState::Error);
                error!(error = %message, "Fetch rejected, stopping");
                self.events.publish(DomainEvent::FetchFailed {
                    error_message: message.clone(),
                    timestamp: Utc::now(),
                });
                CycleReport::new(CycleOutcome::Fatal(message), since, Duration::ZERO)
            }
        }
    }

    async fn process_batch(&self, batch: MentionBatch, since: Option<MentionId>) -> CycleReport {
        self.transition(LoopState::ProcessingBatch);
        let mut report = CycleReport::new(CycleOutcome::Processed, since.clone(), self.interval);
        report.fetched = batch.items.len();
        info!(count = report.fetched, since = ?since, "Processing batch");

        for mention in &batch.items {
            self.events.publish(DomainEvent::MentionReceived {
                mention_id: mention.id.to_string(),
                author_id: mention.author_id.clone(),
                timestamp: Utc::now(),
            });

            match self.processor.process(mention, &batch.context).await {
                Ok(posted) => {
                    report.replied += 1;
                    self.events.publish(DomainEvent::ReplyPosted {
                        mention_id: posted.mention_id.to_string(),
                        reply_id: posted.receipt.reply_id,
                        timestamp: Utc::now(),
                    });
                }
                Err(reason) => {
                    report.skipped += 1;
                    warn!(
                        mention_id = %mention.id,
                        reason = reason.label(),
                        error = %reason,
                        "Mention skipped"
                    );
                    self.events.publish(DomainEvent::MentionSkipped {
                        mention_id: mention.id.to_string(),
                        reason: reason.label().to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }

        self.transition(LoopState::AdvancingCheckpoint);
        let Some(target) = batch.checkpoint_target() else {
            return report;
        };
        if since.as_ref().is_some_and(|current| !target.is_newer_than(current)) {
            debug!(checkpoint = ?since, target = %target, "Checkpoint already current");
            return report;
        }

        match self.checkpoint.save(&target).await {
            Ok(()) => {
                info!(
                    from = ?since,
                    to = %target,
                    replied = report.replied,
                    skipped = report.skipped,
                    "Checkpoint advanced"
                );
                self.events.publish(DomainEvent::CheckpointAdvanced {
                    from: since.as_ref().map(ToString::to_string),
                    to: target.to_string(),
                    timestamp: Utc::now(),
                });
                report.checkpoint = Some(target);
            }
            Err(e) => {
                error!(error = %e, target = %target, "Checkpoint not advanced, batch will be re-fetched");
                self.events.publish(DomainEvent::CheckpointFailed {
                    target: target.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                report.outcome = CycleOutcome::PersistenceFailed(e.to_string());
            }
        }
        report
    }
}
