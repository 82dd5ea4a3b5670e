//! The mention processor.

use optic_config::{AppConfig, CredentialMode};
use optic_core::error::{ImageError, InferenceError, ProcessingError, ReplyError};
use optic_core::mention::{LookupContext, MediaKind, Mention, MentionId, Receipt, ReplyRequest};
use optic_core::{Answer, Credential, FetchedImage, ImageFetcher, InferenceProvider, ReplySink};
use optic_providers::CredentialRotator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::reply::{compose_reply, extract_query};

/// A reply that made it to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub mention_id: MentionId,
    pub reply_text: String,
    pub receipt: Receipt,
}

/// Turns one mention into at most one reply.
///
/// Holds the credential pool for the process; nothing else is shared between
/// mentions.
pub struct MentionProcessor {
    images: Arc<dyn ImageFetcher>,
    provider: Arc<dyn InferenceProvider>,
    sink: Arc<dyn ReplySink>,
    rotator: CredentialRotator,
    handle: String,
    default_prompt: String,
    credential_mode: CredentialMode,
    max_chars: usize,
    timeout: Duration,
}

impl MentionProcessor {
    pub fn new(
        images: Arc<dyn ImageFetcher>,
        provider: Arc<dyn InferenceProvider>,
        sink: Arc<dyn ReplySink>,
        rotator: CredentialRotator,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            images,
            provider,
            sink,
            rotator,
            handle: handle.into(),
            default_prompt: "Describe this image.".into(),
            credential_mode: CredentialMode::Rotate,
            max_chars: 280,
            timeout: Duration::from_secs(30),
        }
    }

    /// Apply the handle, prompt, mode, reply limit and timeout from `config`.
    pub fn configured(self, config: &AppConfig) -> Self {
        Self {
            handle: config.account.bare_handle().to_string(),
            ..self
        }
        .with_default_prompt(&config.inference.default_prompt)
        .with_credential_mode(config.inference.credential_mode)
        .with_max_chars(config.reply.max_chars)
        .with_timeout(Duration::from_secs(config.polling.request_timeout_secs))
    }

    pub fn with_default_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.default_prompt = prompt.into();
        self
    }

    pub fn with_credential_mode(mut self, mode: CredentialMode) -> Self {
        self.credential_mode = mode;
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Bound for each outbound call (image, inference, reply).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn credential_mode(&self) -> CredentialMode {
        self.credential_mode
    }

    /// Process one mention: photo → question → answer → reply.
    ///
    /// Never fails past this boundary; the error is the skip reason.
    pub async fn process(
        &self,
        mention: &Mention,
        context: &LookupContext,
    ) -> Result<Posted, ProcessingError> {
        let username = context.username_for(&mention.author_id);
        if username.is_none() {
            debug!(mention_id = %mention.id, author_id = %mention.author_id, "Author not in lookup context");
        }

        let media = context
            .first_attachment(mention)
            .ok_or(ProcessingError::NoAttachment)?;
        if media.kind != MediaKind::Photo {
            return Err(ProcessingError::NotAPhoto {
                media_key: media.media_key.clone(),
                kind: media.kind.to_string(),
            });
        }
        let url = media
            .url
            .as_deref()
            .ok_or_else(|| ProcessingError::MissingMediaUrl {
                media_key: media.media_key.clone(),
            })?;

        let image = self
            .bounded(self.images.get(url), ImageError::Timeout)
            .await
            .map_err(ProcessingError::ImageUnavailable)?;

        let query = extract_query(&mention.text, &self.handle)
            .unwrap_or_else(|| self.default_prompt.clone());
        debug!(mention_id = %mention.id, query = %query, bytes = image.bytes.len(), "Asking about image");

        let answer = self.infer(&image, &query).await?;
        if answer.answer.trim().is_empty() {
            return Err(ProcessingError::InferenceFailed(
                InferenceError::MalformedResponse("empty answer".into()),
            ));
        }

        let request = ReplyRequest {
            target_mention_id: mention.id.clone(),
            reply_text: compose_reply(username, &answer.answer, self.max_chars),
        };
        let receipt = self
            .bounded(
                self.sink
                    .post_reply(&request.target_mention_id, &request.reply_text),
                ReplyError::Timeout,
            )
            .await
            .map_err(ProcessingError::ReplyFailed)?;

        info!(
            mention_id = %mention.id,
            reply_id = %receipt.reply_id,
            "Reply posted"
        );

        Ok(Posted {
            mention_id: request.target_mention_id,
            reply_text: request.reply_text,
            receipt,
        })
    }

    /// Run inference according to the credential mode.
    async fn infer(&self, image: &FetchedImage, query: &str) -> Result<Answer, ProcessingError> {
        match self.credential_mode {
            CredentialMode::Rotate => {
                let credential = self.rotator.next();
                self.query_with(image, query, &credential)
                    .await
                    .map_err(ProcessingError::InferenceFailed)
            }
            CredentialMode::Probe => {
                let credential = self
                    .rotator
                    .next_valid(|c| async move {
                        self.bounded(self.provider.probe(&c), InferenceError::Timeout)
                            .await
                    })
                    .await?;
                self.query_with(image, query, &credential)
                    .await
                    .map_err(ProcessingError::InferenceFailed)
            }
            CredentialMode::Failover => {
                let (_, answer) = self
                    .rotator
                    .first_success(|c| async move { self.query_with(image, query, &c).await })
                    .await?;
                Ok(answer)
            }
        }
    }

    async fn query_with(
        &self,
        image: &FetchedImage,
        query: &str,
        credential: &Credential,
    ) -> Result<Answer, InferenceError> {
        let result = self
            .bounded(
                self.provider.query(image, query, credential),
                InferenceError::Timeout,
            )
            .await;
        if let Err(e) = &result {
            warn!(
                provider = self.provider.name(),
                credential = %credential,
                error = %e,
                "Inference failed"
            );
        }
        result
    }

    /// Await `fut` under the configured timeout.
    async fn bounded<T, E, F>(&self, fut: F, on_timeout: fn(u64) -> E) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(self.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use optic_core::error::CredentialError;

    fn processor(
        images: Arc<MockImages>,
        provider: Arc<ScriptedInference>,
        sink: Arc<RecordingSink>,
        keys: &[&str],
    ) -> MentionProcessor {
        MentionProcessor::new(images, provider, sink, rotator(keys), "optic_agent")
    }

    #[tokio::test]
    async fn photo_mention_gets_addressed_reply() {
        let images = Arc::new(MockImages::ok());
        let provider = Arc::new(ScriptedInference::answering("a red car"));
        let sink = Arc::new(RecordingSink::new());
        let p = processor(images.clone(), provider.clone(), sink.clone(), &["k1"]);

        let (mention, ctx) = photo_mention("100", "@optic_agent what is this?");
        let posted = p.process(&mention, &ctx).await.unwrap();

        assert_eq!(posted.reply_text, "@alice Answer: a red car");
        assert_eq!(sink.posted(), vec![("100".into(), "@alice Answer: a red car".into())]);
        assert_eq!(provider.prompts(), vec!["what is this?"]);
        assert_eq!(images.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_author_gets_unaddressed_reply() {
        let sink = Arc::new(RecordingSink::new());
        let p = processor(
            Arc::new(MockImages::ok()),
            Arc::new(ScriptedInference::answering("a red car")),
            sink.clone(),
            &["k1"],
        );

        let (mention, mut ctx) = photo_mention("100", "@optic_agent what?");
        ctx.users.clear();
        let posted = p.process(&mention, &ctx).await.unwrap();
        assert_eq!(posted.reply_text, "Answer: a red car");
    }

    #[tokio::test]
    async fn handle_only_uses_default_prompt() {
        let provider = Arc::new(ScriptedInference::answering("a cat"));
        let p = processor(
            Arc::new(MockImages::ok()),
            provider.clone(),
            Arc::new(RecordingSink::new()),
            &["k1"],
        );

        let (mention, ctx) = photo_mention("100", "@optic_agent");
        p.process(&mention, &ctx).await.unwrap();
        assert_eq!(provider.prompts(), vec!["Describe this image."]);
    }

    #[tokio::test]
    async fn no_attachment_is_skipped_without_calls() {
        let images = Arc::new(MockImages::ok());
        let sink = Arc::new(RecordingSink::new());
        let p = processor(
            images.clone(),
            Arc::new(ScriptedInference::answering("x")),
            sink.clone(),
            &["k1"],
        );

        let mention = text_mention("100", "@optic_agent hi");
        let err = p
            .process(&mention, &LookupContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessingError::NoAttachment));
        assert_eq!(images.calls(), 0);
        assert!(sink.posted().is_empty());
    }

    #[tokio::test]
    async fn video_is_not_a_photo() {
        let sink = Arc::new(RecordingSink::new());
        let p = processor(
            Arc::new(MockImages::ok()),
            Arc::new(ScriptedInference::answering("x")),
            sink.clone(),
            &["k1"],
        );

        let (mention, mut ctx) = photo_mention("100", "@optic_agent what?");
        ctx.media[0].kind = MediaKind::Video;
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert_eq!(err.label(), "not_a_photo");
        assert!(sink.posted().is_empty());
    }

    #[tokio::test]
    async fn photo_without_url_is_skipped() {
        let p = processor(
            Arc::new(MockImages::ok()),
            Arc::new(ScriptedInference::answering("x")),
            Arc::new(RecordingSink::new()),
            &["k1"],
        );

        let (mention, mut ctx) = photo_mention("100", "@optic_agent what?");
        ctx.media[0].url = None;
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert!(matches!(err, ProcessingError::MissingMediaUrl { .. }));
    }

    #[tokio::test]
    async fn unreachable_image_is_skipped() {
        let provider = Arc::new(ScriptedInference::answering("x"));
        let sink = Arc::new(RecordingSink::new());
        let p = processor(
            Arc::new(MockImages::failing(404)),
            provider.clone(),
            sink.clone(),
            &["k1"],
        );

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::ImageUnavailable(ImageError::Status(404))
        ));
        assert!(provider.prompts().is_empty());
        assert!(sink.posted().is_empty());
    }

    #[tokio::test]
    async fn inference_failure_is_skipped_in_rotate_mode() {
        let sink = Arc::new(RecordingSink::new());
        let provider = Arc::new(ScriptedInference::rejecting(&["k1"], "a red car"));
        let p = processor(Arc::new(MockImages::ok()), provider.clone(), sink.clone(), &["k1", "k2"]);

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert_eq!(err.label(), "inference_failed");
        assert!(sink.posted().is_empty());

        // The next mention draws the next key
        let (mention, ctx) = photo_mention("101", "@optic_agent what?");
        assert!(p.process(&mention, &ctx).await.is_ok());
        assert_eq!(provider.credentials_used(), vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn failover_mode_rotates_past_rejected_key() {
        let provider = Arc::new(ScriptedInference::rejecting(&["k1"], "a red car"));
        let p = processor(
            Arc::new(MockImages::ok()),
            provider.clone(),
            Arc::new(RecordingSink::new()),
            &["k1", "k2"],
        )
        .with_credential_mode(CredentialMode::Failover);

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        let posted = p.process(&mention, &ctx).await.unwrap();
        assert_eq!(posted.reply_text, "@alice Answer: a red car");
        assert_eq!(provider.credentials_used(), vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn probe_mode_probes_then_queries() {
        let provider = Arc::new(ScriptedInference::rejecting(&["k1", "k2"], "a red car"));
        let p = processor(
            Arc::new(MockImages::ok()),
            provider.clone(),
            Arc::new(RecordingSink::new()),
            &["k1", "k2", "k3"],
        )
        .with_credential_mode(CredentialMode::Probe);

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        p.process(&mention, &ctx).await.unwrap();
        assert_eq!(provider.probes(), vec!["k1", "k2", "k3"]);
        assert_eq!(provider.credentials_used(), vec!["k3"]);
    }

    #[tokio::test]
    async fn exhausted_pool_is_no_valid_credential() {
        let sink = Arc::new(RecordingSink::new());
        let provider = Arc::new(ScriptedInference::rejecting(&["k1", "k2"], "x"));
        let p = processor(Arc::new(MockImages::ok()), provider.clone(), sink.clone(), &["k1", "k2"])
            .with_credential_mode(CredentialMode::Probe);

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::NoValidCredential(CredentialError::NoValidCredential { attempts: 2 })
        ));
        assert_eq!(provider.probes().len(), 2);
        assert!(sink.posted().is_empty());
    }

    #[tokio::test]
    async fn reply_failure_is_reported() {
        let sink = Arc::new(RecordingSink::failing());
        let p = processor(
            Arc::new(MockImages::ok()),
            Arc::new(ScriptedInference::answering("x")),
            sink.clone(),
            &["k1"],
        );

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert_eq!(err.label(), "reply_failed");
    }

    #[tokio::test]
    async fn empty_answer_is_not_posted() {
        let sink = Arc::new(RecordingSink::new());
        let p = processor(
            Arc::new(MockImages::ok()),
            Arc::new(ScriptedInference::answering("   ")),
            sink.clone(),
            &["k1"],
        );

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert_eq!(err.label(), "inference_failed");
        assert!(sink.posted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_image_times_out() {
        let p = processor(
            Arc::new(MockImages::ok().with_delay(Duration::from_secs(60))),
            Arc::new(ScriptedInference::answering("x")),
            Arc::new(RecordingSink::new()),
            &["k1"],
        )
        .with_timeout(Duration::from_secs(5));

        let (mention, ctx) = photo_mention("100", "@optic_agent what?");
        let err = p.process(&mention, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::ImageUnavailable(ImageError::Timeout(5))
        ));
    }

    #[test]
    fn configured_applies_settings() {
        let mut config = AppConfig::default();
        config.account.handle = "@other_bot".into();
        config.inference.credential_mode = CredentialMode::Failover;
        let p = processor(
            Arc::new(MockImages::ok()),
            Arc::new(ScriptedInference::answering("x")),
            Arc::new(RecordingSink::new()),
            &["k1"],
        )
        .configured(&config);
        assert_eq!(p.handle, "other_bot");
        assert_eq!(p.credential_mode(), CredentialMode::Failover);
    }
}
