//! Twitter API v2 adapter.
//!
//! Reads mentions with the app-only bearer token and posts replies with an
//! OAuth 2.0 user-context token:
//! - `GET /2/users/{id}/mentions` with the author and media expansions
//! - `POST /2/tweets` with `reply.in_reply_to_tweet_id`
//!
//! The API returns mentions newest first; batches are reversed so they are
//! handed out oldest first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use optic_core::error::{Error, FetchError, ReplyError};
use optic_core::mention::{LookupContext, MediaItem, MediaKind, Mention, MentionBatch, MentionId};
use optic_core::{MentionSource, Receipt, ReplySink};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Twitter API v2 client for one bot account.
pub struct TwitterClient {
    base_url: String,
    bearer_token: String,
    user_access_token: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl std::fmt::Debug for TwitterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitterClient")
            .field("base_url", &self.base_url)
            .field("bearer_token", &"[REDACTED]")
            .field("user_access_token", &"[REDACTED]")
            .finish()
    }
}

impl TwitterClient {
    pub fn new(
        base_url: impl Into<String>,
        bearer_token: impl Into<String>,
        user_access_token: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: bearer_token.into(),
            user_access_token: user_access_token.into(),
            timeout_secs: timeout.as_secs(),
            client,
        }
    }

    /// Build from configuration. Both tokens must be present.
    pub fn from_config(config: &optic_config::AppConfig) -> Result<Self, Error> {
        let twitter = &config.twitter;
        let bearer = twitter.bearer_token.clone().ok_or_else(|| Error::Config {
            message: "twitter.bearer_token is not set".into(),
        })?;
        let user = twitter
            .user_access_token
            .clone()
            .ok_or_else(|| Error::Config {
                message: "twitter.user_access_token is not set".into(),
            })?;

        Ok(Self::new(
            &twitter.api_url,
            bearer,
            user,
            Duration::from_secs(config.polling.request_timeout_secs),
        ))
    }
}

#[async_trait]
impl MentionSource for TwitterClient {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn fetch_mentions(
        &self,
        account_id: &str,
        since: Option<&MentionId>,
        page_size: u32,
    ) -> Result<MentionBatch, FetchError> {
        let url = format!("{}/users/{}/mentions", self.base_url, account_id);

        let mut params: Vec<(&str, String)> = vec![
            ("max_results", page_size.to_string()),
            ("expansions", "author_id,attachments.media_keys".into()),
            ("media.fields", "url,type".into()),
            ("user.fields", "username".into()),
            ("tweet.fields", "author_id,attachments".into()),
        ];
        if let Some(id) = since {
            params.push(("since_id", id.to_string()));
        }

        debug!(account_id, since = ?since, page_size, "Fetching mentions");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Transient(format!("request timed out after {}s", self.timeout_secs))
                } else {
                    FetchError::Transient(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let reset_at = parse_rate_limit_reset(response.headers());
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Mentions request failed");
            return Err(classify_fetch_status(status, reset_at, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("Failed to read response: {e}")))?;

        let batch = parse_mentions(&body)?;
        if !batch.is_empty() {
            info!(
                count = batch.items.len(),
                newest_id = ?batch.newest_id,
                "Fetched mentions"
            );
        }
        Ok(batch)
    }
}

#[async_trait]
impl ReplySink for TwitterClient {
    fn name(&self) -> &str {
        "twitter"
    }

    async fn post_reply(&self, in_reply_to: &MentionId, text: &str) -> Result<Receipt, ReplyError> {
        let url = format!("{}/tweets", self.base_url);
        let body = PostTweetRequest {
            text,
            reply: ReplyTarget {
                in_reply_to_tweet_id: in_reply_to.as_str(),
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.user_access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReplyError::Timeout(self.timeout_secs)
                } else {
                    ReplyError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(ReplyError::RateLimited);
        }
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ReplyError::Rejected {
                status_code: status,
                message,
            });
        }

        let posted: PostTweetResponse = response
            .json()
            .await
            .map_err(|e| ReplyError::Network(format!("Failed to parse response: {e}")))?;

        match posted.data {
            Some(tweet) => Ok(Receipt { reply_id: tweet.id }),
            None => Err(ReplyError::Rejected {
                status_code: status,
                message: join_api_errors(&posted.errors),
            }),
        }
    }
}

/// Map a non-success mentions status to a fetch error.
fn classify_fetch_status(status: u16, reset_at: Option<DateTime<Utc>>, body: String) -> FetchError {
    match status {
        429 => FetchError::RateLimited { reset_at },
        400 | 401 | 403 | 404 => FetchError::Fatal(format!("status {status}: {body}")),
        _ => FetchError::Transient(format!("status {status}: {body}")),
    }
}

/// `x-rate-limit-reset` carries the window reset as epoch seconds.
fn parse_rate_limit_reset(headers: &reqwest::header::HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get("x-rate-limit-reset")?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Decode a mentions response into a batch, oldest first.
fn parse_mentions(body: &str) -> Result<MentionBatch, FetchError> {
    let response: MentionsResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::Transient(format!("Failed to parse mentions: {e}")))?;

    if response.errors.as_ref().is_some_and(|e| !e.is_empty()) {
        // Partial errors (deleted media, suspended authors) come alongside data
        warn!(errors = %join_api_errors(&response.errors), "Mentions response carried errors");
    }

    let mut items: Vec<Mention> = response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|t| Mention {
            id: MentionId::new(t.id),
            author_id: t.author_id.unwrap_or_default(),
            text: t.text,
            attachment_media_keys: t.attachments.map(|a| a.media_keys).unwrap_or_default(),
        })
        .collect();
    items.reverse();

    let includes = response.includes.unwrap_or_default();
    let context = LookupContext {
        users: includes
            .users
            .into_iter()
            .map(|u| (u.id, u.username))
            .collect(),
        media: includes
            .media
            .into_iter()
            .map(|m| MediaItem {
                media_key: m.media_key,
                kind: MediaKind::parse(&m.kind),
                url: m.url,
            })
            .collect(),
    };

    Ok(MentionBatch {
        items,
        context,
        newest_id: response.meta.and_then(|m| m.newest_id).map(MentionId::new),
    })
}

fn join_api_errors(errors: &Option<Vec<ApiError>>) -> String {
    errors
        .iter()
        .flatten()
        .map(|e| e.detail.clone().unwrap_or_else(|| e.title.clone().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("; ")
}

// --- Twitter API types ---

#[derive(Deserialize)]
struct MentionsResponse {
    data: Option<Vec<ApiTweet>>,
    includes: Option<Includes>,
    meta: Option<Meta>,
    errors: Option<Vec<ApiError>>,
}

#[derive(Deserialize)]
struct ApiTweet {
    id: String,
    text: String,
    author_id: Option<String>,
    attachments: Option<Attachments>,
}

#[derive(Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Deserialize, Default)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
    #[serde(default)]
    media: Vec<ApiMedia>,
}

#[derive(Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Deserialize)]
struct ApiMedia {
    media_key: String,
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct Meta {
    newest_id: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    title: Option<String>,
    detail: Option<String>,
}

#[derive(Serialize)]
struct PostTweetRequest<'a> {
    text: &'a str,
    reply: ReplyTarget<'a>,
}

#[derive(Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

#[derive(Deserialize)]
struct PostTweetResponse {
    data: Option<PostedTweet>,
    errors: Option<Vec<ApiError>>,
}

#[derive(Deserialize)]
struct PostedTweet {
    id: String,
}
