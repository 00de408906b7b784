//! Incremental fetch decision.
//!
//! The watermark is the most recent persisted non-quote post. If it is
//! younger than the configured interval the run is skipped; otherwise its id
//! becomes the `since_id` cursor for the next fetch.

use crate::model::{SyncDecision, Watermark};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Decide whether to sync given the last persisted post.
///
/// `elapsed < interval_days` skips; equality syncs.
#[must_use]
pub fn resolve(last: Option<&Watermark>, interval_days: f64, now: DateTime<Utc>) -> SyncDecision {
    let Some(last) = last else {
        debug!("No prior synced post; fetching full lookback window");
        return SyncDecision::Sync { since_id: None };
    };

    let Some(elapsed_days) = elapsed_days(&last.created_at, now) else {
        warn!(
            tweet_id = %last.tweet_id,
            created_at = %last.created_at,
            "Stored created_at does not parse; syncing from stored id"
        );
        return SyncDecision::Sync {
            since_id: Some(last.tweet_id.clone()),
        };
    };

    if elapsed_days < interval_days {
        debug!(elapsed_days, interval_days, "Interval not yet elapsed");
        SyncDecision::Skip { elapsed_days }
    } else {
        SyncDecision::Sync {
            since_id: Some(last.tweet_id.clone()),
        }
    }
}

/// Fractional days between `created_at` and `now`.
#[allow(clippy::cast_precision_loss)]
fn elapsed_days(created_at: &str, now: DateTime<Utc>) -> Option<f64> {
    let created = DateTime::parse_from_rfc3339(created_at).ok()?;
    let ms = now
        .signed_duration_since(created.with_timezone(&Utc))
        .num_milliseconds();
    Some(ms as f64 / MS_PER_DAY)
}
