//! Data models for synced X posts.
//!
//! Wire types mirror the X API v2 JSON shapes closely enough to deserialize
//! a `users/:id/tweets` response. [`StoredRecord`] is the normalized row that
//! lands in the store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reference type marking a quoted post.
pub const REFERENCE_QUOTED: &str = "quoted";

/// A post as returned by the X API.
///
/// Fields the sync does not interpret are kept in `extra` so the raw payload
/// serializes back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub text: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_tweets: Option<Vec<ReferencedPost>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// Key used to group this post into a conversation.
    #[must_use]
    pub fn conversation_key(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(&self.id)
    }

    /// Media keys attached to this post, in attachment order.
    #[must_use]
    pub fn media_keys(&self) -> &[String] {
        self.attachments
            .as_ref()
            .and_then(|a| a.media_keys.as_deref())
            .unwrap_or_default()
    }

    /// Ids of posts this post quotes.
    pub fn quoted_ids(&self) -> impl Iterator<Item = &str> {
        self.referenced_tweets
            .iter()
            .flatten()
            .filter(|r| r.kind == REFERENCE_QUOTED)
            .map(|r| r.id.as_str())
    }
}

/// Attachment references on a post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_keys: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A reference from one post to another (quote, reply, repost).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencedPost {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// Media included alongside a batch of posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub media_key: String,
    #[serde(rename = "type")]
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image_url: Option<String>,
}

impl Media {
    /// Direct URL if present, otherwise the preview image.
    #[must_use]
    pub fn best_url(&self) -> Option<&str> {
        self.url.as_deref().or(self.preview_image_url.as_deref())
    }
}

/// An X account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub username: String,
}

/// Everything one fetch returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostBatch {
    pub posts: Vec<Post>,
    pub media: Vec<Media>,
    pub quoted_posts: Vec<Post>,
    pub authors: Vec<Author>,
}

impl PostBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// The persisted unit, one row per post id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub tweet_id: String,
    pub author_id: String,
    pub created_at: String,
    pub text: String,
    pub conversation_id: Option<String>,
    pub thread_root_id: String,
    pub permalink: String,
    pub media_urls: Vec<String>,
    pub media_types: Vec<String>,
    pub is_quote: bool,
    pub raw: Value,
}

/// The most recent persisted non-quote post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub tweet_id: String,
    pub created_at: String,
}

/// Whether a run should fetch, and from where.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum SyncDecision {
    /// Too soon since the last synced post.
    Skip { elapsed_days: f64 },
    /// Fetch posts strictly newer than `since_id`, or the whole lookback
    /// window when there is no cursor.
    Sync { since_id: Option<String> },
}

impl SyncDecision {
    #[must_use]
    pub const fn should_sync(&self) -> bool {
        matches!(self, Self::Sync { .. })
    }

    #[must_use]
    pub fn since_id(&self) -> Option<&str> {
        match self {
            Self::Sync { since_id } => since_id.as_deref(),
            Self::Skip { .. } => None,
        }
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub skipped: bool,
    pub since_id: Option<String>,
    pub fetched: usize,
    pub own_records: usize,
    pub quoted_records: usize,
    pub upserted: usize,
    pub dry_run: bool,
}
