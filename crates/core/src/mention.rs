//! Mention and batch domain types.
//!
//! These are the value objects that flow through one poll cycle:
//! Source yields a batch → Processor handles each mention → Sink receives a reply.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Opaque, ordered mention identifier.
///
/// Platform ids are decimal strings without leading zeros that can outgrow
/// `u64`, so two all-digit ids compare by length first, then digit by digit.
/// All-digit ids sort before any other id; non-numeric ids compare as plain
/// strings among themselves. This keeps the order total on mixed input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MentionId(pub String);

impl MentionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id is strictly newer than `other`.
    pub fn is_newer_than(&self, other: &MentionId) -> bool {
        self > other
    }

    fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Ord for MentionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => self
                .0
                .len()
                .cmp(&other.0.len())
                .then_with(|| self.0.cmp(&other.0)),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for MentionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for MentionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MentionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An inbound message addressed to the bot account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub id: MentionId,

    /// Platform user id of the author
    pub author_id: String,

    /// Raw text, including the bot handle
    pub text: String,

    /// Keys of attached media, in attachment order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachment_media_keys: Vec<String>,
}

/// The kind of an attached media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    AnimatedGif,
    #[serde(other)]
    Other,
}

impl MediaKind {
    /// Parse the platform's type string. Unknown values map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "photo" => Self::Photo,
            "video" => Self::Video,
            "animated_gif" => Self::AnimatedGif,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::AnimatedGif => "animated_gif",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One media object from the lookup context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub media_key: String,

    pub kind: MediaKind,

    /// Direct URL. Platforms omit it for some media types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Side data that accompanies one fetch: author names and attached media.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupContext {
    /// author_id → username
    #[serde(default)]
    pub users: HashMap<String, String>,

    /// Media objects, in the order the platform returned them
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

impl LookupContext {
    pub fn username_for(&self, author_id: &str) -> Option<&str> {
        self.users.get(author_id).map(String::as_str)
    }

    /// First media item (in context order) referenced by the mention.
    pub fn first_attachment(&self, mention: &Mention) -> Option<&MediaItem> {
        self.media
            .iter()
            .find(|m| mention.attachment_media_keys.contains(&m.media_key))
    }
}

/// The result of one successful fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MentionBatch {
    /// Mentions in the order they should be processed
    pub items: Vec<Mention>,

    pub context: LookupContext,

    /// Newest id in the batch, as reported by the platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_id: Option<MentionId>,
}

impl MentionBatch {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The id the checkpoint should advance to: the reported newest id, or the
    /// largest item id when the platform did not report one.
    pub fn checkpoint_target(&self) -> Option<MentionId> {
        self.newest_id
            .clone()
            .or_else(|| self.items.iter().map(|m| m.id.clone()).max())
    }
}

/// A reply ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub target_mention_id: MentionId,
    pub reply_text: String,
}

/// Acknowledgement from the reply sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Platform id of the posted reply
    pub reply_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(id: &str, keys: &[&str]) -> Mention {
        Mention {
            id: MentionId::new(id),
            author_id: "42".into(),
            text: "@optic_agent what is this?".into(),
            attachment_media_keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    #[test]
    fn numeric_ids_compare_by_value() {
        let older = MentionId::new("999");
        let newer = MentionId::new("1000");
        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
        assert!(!older.is_newer_than(&older));
    }

    #[test]
    fn snowflake_ids_beyond_u64() {
        let a = MentionId::new("18717463312129925120000");
        let b = MentionId::new("18717463312129925120001");
        assert!(b > a);
    }

    #[test]
    fn non_numeric_ids_fall_back_to_string_order() {
        assert!(MentionId::new("b") > MentionId::new("a"));
        assert!(MentionId::new("abc") > MentionId::new("999"));
    }

    #[test]
    fn mixed_ids_order_is_transitive() {
        let nine = MentionId::new("9");
        let ten = MentionId::new("10");
        let odd = MentionId::new("1a");
        assert!(nine < ten);
        assert!(ten < odd);
        assert!(nine < odd);

        let mut ids = vec![odd.clone(), ten.clone(), nine.clone()];
        ids.sort();
        assert_eq!(ids, vec![nine, ten, odd.clone()]);
        assert_eq!(ids.into_iter().max(), Some(odd));
    }

    #[test]
    fn first_attachment_uses_context_order() {
        let ctx = LookupContext {
            users: HashMap::new(),
            media: vec![
                MediaItem {
                    media_key: "3_2".into(),
                    kind: MediaKind::Photo,
                    url: Some("https://img/2.jpg".into()),
                },
                MediaItem {
                    media_key: "3_1".into(),
                    kind: MediaKind::Photo,
                    url: Some("https://img/1.jpg".into()),
                },
            ],
        };
        let m = mention("1", &["3_1", "3_2"]);
        assert_eq!(ctx.first_attachment(&m).unwrap().media_key, "3_2");

        let none = mention("2", &["7_7"]);
        assert!(ctx.first_attachment(&none).is_none());
    }

    #[test]
    fn checkpoint_target_prefers_reported_newest() {
        let batch = MentionBatch {
            items: vec![mention("10", &[]), mention("11", &[])],
            context: LookupContext::default(),
            newest_id: Some(MentionId::new("12")),
        };
        assert_eq!(batch.checkpoint_target(), Some(MentionId::new("12")));

        let unreported = MentionBatch {
            newest_id: None,
            ..batch
        };
        assert_eq!(unreported.checkpoint_target(), Some(MentionId::new("11")));
        assert_eq!(MentionBatch::default().checkpoint_target(), None);
    }

    #[test]
    fn media_kind_parsing() {
        assert_eq!(MediaKind::parse("photo"), MediaKind::Photo);
        assert_eq!(MediaKind::parse("animated_gif"), MediaKind::AnimatedGif);
        assert_eq!(MediaKind::parse("hologram"), MediaKind::Other);
        let parsed: MediaKind = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(parsed, MediaKind::Video);
    }
}
