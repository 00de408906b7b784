//! Supabase (`PostgREST`) store for synced posts.
//!
//! Talks to `{url}/rest/v1/{table}` with the service-role key. Upserts send
//! the whole batch in one request with `on_conflict=tweet_id`, so `PostgREST`
//! applies it in a single statement.

use super::{DEFAULT_TABLE, SyncStore};
use crate::error::{Result, XsyncError};
use crate::model::{StoredRecord, Watermark};
use reqwest::blocking::{Client, RequestBuilder};
use std::time::Duration;
use tracing::{debug, info};

/// `PostgREST`-backed [`SyncStore`].
pub struct SupabaseStore {
    http: Client,
    base_url: String,
    key: String,
    table: String,
}

impl SupabaseStore {
    /// Create a store for the project at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: &str, key: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("xsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            table: DEFAULT_TABLE.to_string(),
        })
    }

    /// Use a table other than `tweets`.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }
}

impl SyncStore for SupabaseStore {
    fn last_synced_post(&self) -> Result<Option<Watermark>> {
        let response = self
            .authorized(self.http.get(self.endpoint()))
            .query(&[
                ("select", "tweet_id,created_at"),
                ("is_quote", "eq.false"),
                ("order", "created_at.desc"),
                ("limit", "1"),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(XsyncError::upstream(status.as_u16(), response.text()?));
        }

        let rows: Vec<Watermark> = response.json()?;
        debug!(found = !rows.is_empty(), "Read watermark from Supabase");
        Ok(rows.into_iter().next())
    }

    fn upsert(&mut self, records: &[StoredRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let response = self
            .authorized(self.http.post(self.endpoint()))
            .query(&[("on_conflict", "tweet_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(records)
            .send()
            .map_err(|e| XsyncError::persist(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(XsyncError::persist(format!("{status}: {body}")));
        }

        info!("Upserted {} records to Supabase", records.len());
        Ok(records.len())
    }
}
