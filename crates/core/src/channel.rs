//! Channel traits: the abstraction over the social platform.
//!
//! A mention source yields batches of mentions since a checkpoint, a reply
//! sink posts answers back, and an image fetcher downloads attachments.
//! Adapters (Twitter API v2, plain HTTP) live in `optic-channels`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, ImageError, ReplyError};
use crate::mention::{MentionBatch, MentionId, Receipt};

/// Downloaded image bytes plus the content type the server reported.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl FetchedImage {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    /// MIME type to use when forwarding the image: the reported type when it
    /// is an image type, otherwise sniffed from the magic bytes.
    pub fn mime_type(&self) -> &str {
        if let Some(ct) = &self.content_type {
            let base = ct.split(';').next().unwrap_or_default().trim();
            if base.starts_with("image/") {
                return base;
            }
        }
        sniff_mime(&self.bytes)
    }
}

impl std::fmt::Debug for FetchedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedImage")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

/// Source of mentions for one account.
#[async_trait]
pub trait MentionSource: Send + Sync {
    /// Human-readable source name (e.g., "twitter").
    fn name(&self) -> &str;

    /// Fetch mentions of `account_id` newer than `since`, at most `page_size`.
    ///
    /// `since = None` means "whatever the platform's natural history window
    /// returns". Items come back in processing order.
    async fn fetch_mentions(
        &self,
        account_id: &str,
        since: Option<&MentionId>,
        page_size: u32,
    ) -> std::result::Result<MentionBatch, FetchError>;
}

/// Destination for replies.
#[async_trait]
pub trait ReplySink: Send + Sync {
    fn name(&self) -> &str;

    /// Post `text` as a reply to the mention `in_reply_to`.
    async fn post_reply(
        &self,
        in_reply_to: &MentionId,
        text: &str,
    ) -> std::result::Result<Receipt, ReplyError>;
}

/// Downloads media by URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn get(&self, url: &str) -> std::result::Result<FetchedImage, ImageError>;
}
