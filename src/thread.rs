//! Thread-root resolution within a single fetched batch.
//!
//! Posts are grouped by `conversation_id` (or their own id when absent) and
//! the earliest post in each group becomes the root. Only the current batch
//! is considered: a reply fetched in a later run whose root was synced
//! earlier resolves to itself.

use crate::model::Post;
use chrono::{DateTime, FixedOffset};
use std::collections::HashMap;

/// Map of conversation key to root post id.
pub type ThreadRoots = HashMap<String, String>;

/// Compute the thread root for every conversation in `posts`.
///
/// Ties keep the first post seen. A timestamp that fails to parse never
/// replaces the current root and is never replaced by a later post.
#[must_use]
pub fn compute_thread_roots(posts: &[Post]) -> ThreadRoots {
    let mut earliest: HashMap<&str, (&str, Option<DateTime<FixedOffset>>)> =
        HashMap::with_capacity(posts.len());

    for post in posts {
        let created_at = DateTime::parse_from_rfc3339(&post.created_at).ok();

        earliest
            .entry(post.conversation_key())
            .and_modify(|current| {
                if let (Some(candidate), Some(existing)) = (created_at, current.1) {
                    if candidate < existing {
                        *current = (post.id.as_str(), created_at);
                    }
                }
            })
            .or_insert((post.id.as_str(), created_at));
    }

    earliest
        .into_iter()
        .map(|(key, (root, _))| (key.to_string(), root.to_string()))
        .collect()
}

/// Root for `post`, falling back to its own id.
#[must_use]
pub fn root_for<'a>(roots: &'a ThreadRoots, post: &'a Post) -> &'a str {
    roots
        .get(post.conversation_key())
        .map_or(post.id.as_str(), String::as_str)
}
