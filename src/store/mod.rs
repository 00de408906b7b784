//! Persistence backends.
//!
//! A store answers two questions for the sync: where did the last run leave
//! off ([`SyncStore::last_synced_post`]) and how to write a batch of records
//! ([`SyncStore::upsert`]). Both backends key rows by `tweet_id` and treat a
//! batch as all-or-nothing.

pub mod sqlite;
pub mod supabase;

pub use sqlite::SqliteStore;
pub use supabase::SupabaseStore;

use crate::error::Result;
use crate::model::{StoredRecord, Watermark};

/// Default table name for synced posts.
pub const DEFAULT_TABLE: &str = "tweets";

/// Storage collaborator for a sync run.
pub trait SyncStore {
    /// The most recent non-quote record by `created_at`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn last_synced_post(&self) -> Result<Option<Watermark>>;

    /// Insert or update `records` keyed by `tweet_id`.
    ///
    /// Returns the number of records written. On error nothing from the batch
    /// is assumed persisted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::XsyncError::Persist`] if the store rejects the batch.
    fn upsert(&mut self, records: &[StoredRecord]) -> Result<usize>;
}
