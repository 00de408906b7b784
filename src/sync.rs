//! One sync run: watermark → fetch → thread roots → records → merge → upsert.
//!
//! Each step waits on the previous one. Any error aborts the run; the next
//! scheduled run starts again from the persisted watermark.

use crate::dedup::merge_records;
use crate::error::Result;
use crate::model::{SyncDecision, SyncReport};
use crate::records::RecordBuilder;
use crate::source::PostSource;
use crate::store::SyncStore;
use crate::thread::compute_thread_roots;
use crate::watermark;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Handle of the account being mirrored, used for permalinks.
    pub handle: String,
    /// Window for the first sync, in days.
    pub lookback_days: u32,
    /// Minimum age of the newest synced post before syncing again.
    pub interval_days: f64,
    /// Ignore the interval (still uses the cursor).
    pub force: bool,
    /// Build records but do not write them.
    pub dry_run: bool,
}

impl SyncOptions {
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            lookback_days: 7,
            interval_days: 0.0,
            force: false,
            dry_run: false,
        }
    }
}

/// Sequences the collaborators for one run.
pub struct Syncer<'a, S: PostSource, T: SyncStore> {
    source: &'a S,
    store: &'a mut T,
    options: SyncOptions,
}

impl<'a, S: PostSource, T: SyncStore> Syncer<'a, S, T> {
    pub fn new(source: &'a S, store: &'a mut T, options: SyncOptions) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    /// Run once against the current time.
    ///
    /// # Errors
    ///
    /// Propagates the first fetch, transform, or persist failure.
    pub fn run(&mut self) -> Result<SyncReport> {
        self.run_at(Utc::now())
    }

    /// Run once, treating `now` as the current time.
    ///
    /// # Errors
    ///
    /// Propagates the first fetch, transform, or persist failure.
    #[instrument(skip(self), fields(handle = %self.options.handle))]
    pub fn run_at(&mut self, now: DateTime<Utc>) -> Result<SyncReport> {
        let last = self.store.last_synced_post()?;
        let interval = if self.options.force {
            0.0
        } else {
            self.options.interval_days
        };

        let since_id = match watermark::resolve(last.as_ref(), interval, now) {
            SyncDecision::Skip { elapsed_days } => {
                info!(
                    elapsed_days,
                    interval_days = self.options.interval_days,
                    "Last sync is recent; skipping"
                );
                return Ok(SyncReport {
                    skipped: true,
                    dry_run: self.options.dry_run,
                    ..SyncReport::default()
                });
            }
            SyncDecision::Sync { since_id } => since_id,
        };

        let account = self.source.lookup_account(&self.options.handle)?;
        let batch = self.source.fetch_recent_posts(
            &account.id,
            since_id.as_deref(),
            self.options.lookback_days,
        )?;

        let mut report = SyncReport {
            since_id,
            fetched: batch.posts.len(),
            dry_run: self.options.dry_run,
            ..SyncReport::default()
        };

        if batch.is_empty() {
            info!("No posts found in the sync window");
            return Ok(report);
        }
        info!(fetched = batch.posts.len(), "Fetched posts");

        let roots = compute_thread_roots(&batch.posts);
        let builder = RecordBuilder::new(&account.id, &self.options.handle, &batch);
        let own = builder.own_records(&batch.posts, &roots)?;
        let quoted = if batch.quoted_posts.is_empty() {
            Vec::new()
        } else {
            builder.quoted_records(&batch.quoted_posts)?
        };
        report.own_records = own.len();
        report.quoted_records = quoted.len();

        let records = merge_records(own, quoted);

        if self.options.dry_run {
            info!(records = records.len(), "Dry run; nothing written");
            return Ok(report);
        }

        report.upserted = self.store.upsert(&records)?;
        info!(upserted = report.upserted, "Upserted posts");
        Ok(report)
    }
}
