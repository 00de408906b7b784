//! Builds storage-ready records from a fetched batch.
//!
//! Own posts get the syncing account as author, a permalink under the
//! configured handle, resolved media, and the batch's thread root. Quoted
//! posts are flattened into standalone records: their own root, no media,
//! raw payload untouched.

use crate::model::{Author, Media, Post, PostBatch, StoredRecord};
use crate::thread::{ThreadRoots, root_for};
use serde_json::Value;
use std::collections::HashMap;

/// Base for public post links.
pub const PERMALINK_BASE: &str = "https://x.com";

/// Public link for a post by `handle`.
#[must_use]
pub fn permalink(handle: &str, post_id: &str) -> String {
    format!("{PERMALINK_BASE}/{handle}/status/{post_id}")
}

/// Transforms raw posts into [`StoredRecord`]s for one batch.
pub struct RecordBuilder<'a> {
    account_id: &'a str,
    handle: &'a str,
    media_by_key: HashMap<&'a str, &'a Media>,
    authors_by_id: HashMap<&'a str, &'a Author>,
}

impl<'a> RecordBuilder<'a> {
    /// Index the batch's media and authors for lookup.
    #[must_use]
    pub fn new(account_id: &'a str, handle: &'a str, batch: &'a PostBatch) -> Self {
        Self {
            account_id,
            handle,
            media_by_key: batch
                .media
                .iter()
                .map(|m| (m.media_key.as_str(), m))
                .collect(),
            authors_by_id: batch
                .authors
                .iter()
                .map(|a| (a.id.as_str(), a))
                .collect(),
        }
    }

    /// Media attached to `post`, in attachment order. Unknown keys are
    /// dropped.
    #[must_use]
    pub fn resolve_media(&self, post: &Post) -> Vec<&'a Media> {
        post.media_keys()
            .iter()
            .filter_map(|key| self.media_by_key.get(key.as_str()).copied())
            .collect()
    }

    /// Build the record for one of the account's own posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the post cannot be serialized into the raw payload.
    pub fn own_record(
        &self,
        post: &Post,
        roots: &ThreadRoots,
    ) -> serde_json::Result<StoredRecord> {
        let media = self.resolve_media(post);
        // Items without any URL stay in `raw` but not in the aligned lists.
        let (media_urls, media_types): (Vec<String>, Vec<String>) = media
            .iter()
            .filter_map(|m| Some((m.best_url()?.to_string(), m.media_type.clone())))
            .unzip();

        let mut raw = serde_json::to_value(post)?;
        if let Value::Object(map) = &mut raw {
            map.insert("media".to_string(), serde_json::to_value(&media)?);
        }

        Ok(StoredRecord {
            tweet_id: post.id.clone(),
            author_id: self.account_id.to_string(),
            created_at: post.created_at.clone(),
            text: post.text.clone(),
            conversation_id: post.conversation_id.clone(),
            thread_root_id: root_for(roots, post).to_string(),
            permalink: permalink(self.handle, &post.id),
            media_urls,
            media_types,
            is_quote: false,
            raw,
        })
    }

    /// Build the record for a post quoted by one of the account's posts.
    ///
    /// # Errors
    ///
    /// Returns an error if the post cannot be serialized into the raw payload.
    pub fn quoted_record(&self, post: &Post) -> serde_json::Result<StoredRecord> {
        let author_id = post.author_id.clone().unwrap_or_default();
        let link = self
            .authors_by_id
            .get(author_id.as_str())
            .map(|author| permalink(&author.username, &post.id))
            .unwrap_or_default();

        Ok(StoredRecord {
            tweet_id: post.id.clone(),
            author_id,
            created_at: post.created_at.clone(),
            text: post.text.clone(),
            conversation_id: post.conversation_id.clone(),
            thread_root_id: post.id.clone(),
            permalink: link,
            media_urls: Vec::new(),
            media_types: Vec::new(),
            is_quote: true,
            raw: serde_json::to_value(post)?,
        })
    }

    /// Records for every own post in `posts`.
    ///
    /// # Errors
    ///
    /// Returns the first serialization error.
    pub fn own_records(
        &self,
        posts: &[Post],
        roots: &ThreadRoots,
    ) -> serde_json::Result<Vec<StoredRecord>> {
        posts.iter().map(|p| self.own_record(p, roots)).collect()
    }

    /// Records for every quoted post in `posts`.
    ///
    /// # Errors
    ///
    /// Returns the first serialization error.
    pub fn quoted_records(&self, posts: &[Post]) -> serde_json::Result<Vec<StoredRecord>> {
        posts.iter().map(|p| self.quoted_record(p)).collect()
    }
}
