//! Shared test doubles for processor tests.

use async_trait::async_trait;
use optic_core::error::{ImageError, InferenceError, ReplyError};
use optic_core::mention::{LookupContext, MediaItem, MediaKind, Mention, MentionId, Receipt};
use optic_core::{Answer, Credential, FetchedImage, ImageFetcher, InferenceProvider, ReplySink};
use optic_providers::CredentialRotator;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub fn rotator(keys: &[&str]) -> CredentialRotator {
    CredentialRotator::new(keys.iter().map(|k| Credential::new(*k)).collect()).unwrap()
}

/// A mention from `alice` with one photo attached.
pub fn photo_mention(id: &str, text: &str) -> (Mention, LookupContext) {
    let mention = Mention {
        id: MentionId::new(id),
        author_id: "7".into(),
        text: text.into(),
        attachment_media_keys: vec![format!("3_{id}")],
    };
    let context = LookupContext {
        users: HashMap::from([("7".to_string(), "alice".to_string())]),
        media: vec![MediaItem {
            media_key: format!("3_{id}"),
            kind: MediaKind::Photo,
            url: Some(format!("https://pbs.twimg.com/media/{id}.jpg")),
        }],
    };
    (mention, context)
}

pub fn text_mention(id: &str, text: &str) -> Mention {
    Mention {
        id: MentionId::new(id),
        author_id: "7".into(),
        text: text.into(),
        attachment_media_keys: vec![],
    }
}

pub struct MockImages {
    status: Option<u16>,
    delay: Option<Duration>,
    calls: Mutex<usize>,
}

impl MockImages {
    pub fn ok() -> Self {
        Self {
            status: None,
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::ok()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ImageFetcher for MockImages {
    async fn get(&self, _url: &str) -> Result<FetchedImage, ImageError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.status {
            Some(status) => Err(ImageError::Status(status)),
            None => Ok(FetchedImage::new(
                vec![0xFF, 0xD8, 0xFF],
                Some("image/jpeg".into()),
            )),
        }
    }
}

/// Answers every query with a fixed text, rejecting some credentials.
pub struct ScriptedInference {
    answer: String,
    rejected: Vec<String>,
    prompts: Mutex<Vec<String>>,
    credentials_used: Mutex<Vec<String>>,
    probes: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn answering(answer: &str) -> Self {
        Self::rejecting(&[], answer)
    }

    pub fn rejecting(keys: &[&str], answer: &str) -> Self {
        Self {
            answer: answer.into(),
            rejected: keys.iter().map(|k| k.to_string()).collect(),
            prompts: Mutex::new(vec![]),
            credentials_used: Mutex::new(vec![]),
            probes: Mutex::new(vec![]),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn credentials_used(&self) -> Vec<String> {
        self.credentials_used.lock().unwrap().clone()
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().unwrap().clone()
    }

    fn check(&self, credential: &Credential) -> Result<(), InferenceError> {
        if self.rejected.iter().any(|k| k == credential.expose()) {
            Err(InferenceError::AuthenticationFailed("revoked".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl InferenceProvider for ScriptedInference {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn query(
        &self,
        _image: &FetchedImage,
        prompt: &str,
        credential: &Credential,
    ) -> Result<Answer, InferenceError> {
        self.credentials_used
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        self.check(credential)?;
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Answer::new(self.answer.clone()))
    }

    async fn probe(&self, credential: &Credential) -> Result<(), InferenceError> {
        self.probes
            .lock()
            .unwrap()
            .push(credential.expose().to_string());
        self.check(credential)
    }
}

/// Records every reply; optionally rejects them all.
pub struct RecordingSink {
    fail: bool,
    posted: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            fail: false,
            posted: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn posted(&self) -> Vec<(String, String)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn post_reply(&self, in_reply_to: &MentionId, text: &str) -> Result<Receipt, ReplyError> {
        if self.fail {
            return Err(ReplyError::Rejected {
                status_code: 403,
                message: "duplicate content".into(),
            });
        }
        let mut posted = self.posted.lock().unwrap();
        posted.push((in_reply_to.to_string(), text.to_string()));
        Ok(Receipt {
            reply_id: format!("r{}", posted.len()),
        })
    }
}
