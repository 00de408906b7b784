//! xsync - Incremental mirror of an X account's posts
//!
//! This library fetches an account's recent posts from the X API and upserts
//! them into a relational store, one row per post. Quoted posts are stored
//! as standalone records and replies are grouped under their thread root.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`config`] - Layered configuration (file, environment, CLI)
//! - [`error`] - Custom error types with rich context
//! - [`model`] - Posts, media, stored records, and run reports
//! - [`source`] - X API client
//! - [`watermark`] - Decides whether to sync and from which cursor
//! - [`thread`] - Thread-root resolution within a batch
//! - [`records`] - Flattens posts into stored records
//! - [`dedup`] - Merges own and quoted records by post id
//! - [`store`] - `SQLite` and Supabase persistence
//! - [`sync`] - Sequences one sync run

pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod model;
pub mod records;
pub mod source;
pub mod store;
pub mod sync;
pub mod thread;
pub mod watermark;

pub use cli::*;
pub use config::Config;
pub use error::{Result, ResultExt, XsyncError, format_error};
pub use model::*;
pub use source::{PostSource, XClient, XClientOptions};
pub use store::{SqliteStore, SupabaseStore, SyncStore};
pub use sync::{SyncOptions, Syncer};

use chrono::{DateTime, Datelike, Utc};

/// Default database filename
pub const DEFAULT_DB_NAME: &str = "xsync.db";

/// Standard width for major header dividers in CLI output
pub const HEADER_DIVIDER_WIDTH: usize = 50;

/// Get the default data directory for xsync
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("xsync")
}

/// Get the default database path
#[must_use]
pub fn default_db_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_DB_NAME)
}

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let grouped = group_digits(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_number_usize(value: usize) -> String {
    group_digits(&value.to_string())
}

fn group_digits(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}

/// Format a datetime as a human-friendly relative string.
///
/// - < 1 minute: "just now"
/// - < 1 hour: "Nm ago"
/// - < 24 hours: "Nh ago"
/// - < 7 days: "Nd ago"
/// - Same calendar year: "Mon D"
/// - Different year: "Mon D, YYYY"
#[must_use]
pub fn format_relative_date(dt: DateTime<Utc>) -> String {
    format_relative_date_with_base(dt, Utc::now())
}

/// Format a datetime relative to a fixed base time.
#[must_use]
pub fn format_relative_date_with_base(dt: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(dt);
    if duration.num_seconds() < 0 {
        return dt.format("%b %d, %Y").to_string();
    }

    let minutes = duration.num_minutes();
    let hours = duration.num_hours();
    let days = duration.num_days();

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else if dt.year() == now.year() {
        dt.format("%b %d").to_string()
    } else {
        dt.format("%b %d, %Y").to_string()
    }
}
