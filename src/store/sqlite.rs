//! `SQLite` store for synced posts.
//!
//! One `tweets` table keyed by `tweet_id`. Media lists and the raw payload
//! are stored as JSON text.

use super::SyncStore;
use crate::error::{Result, ResultExt, XsyncError};
use crate::model::{StoredRecord, Watermark};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA_VERSION: i32 = 1;

/// `SQLite`-backed [`SyncStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = Self { conn };
        store.migrate()?;
        debug!("Opened database at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be initialized.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);",
        )?;
        let current = self.schema_version()?;

        if current > SCHEMA_VERSION {
            return Err(XsyncError::SchemaMismatch {
                expected: SCHEMA_VERSION,
                found: current,
            });
        }
        if current < SCHEMA_VERSION {
            info!(
                "Migrating database from version {} to {}",
                current, SCHEMA_VERSION
            );
            self.create_schema()?;
            self.conn.execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', ?)",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }
        Ok(())
    }

    fn schema_version(&self) -> Result<i32> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS tweets (
                tweet_id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                text TEXT NOT NULL,
                conversation_id TEXT,
                thread_root_id TEXT NOT NULL,
                permalink TEXT NOT NULL,
                media_urls TEXT NOT NULL DEFAULT '[]',
                media_types TEXT NOT NULL DEFAULT '[]',
                is_quote INTEGER NOT NULL DEFAULT 0,
                raw TEXT NOT NULL,
                synced_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tweets_watermark ON tweets(is_quote, created_at);
            CREATE INDEX IF NOT EXISTS idx_tweets_thread_root ON tweets(thread_root_id);
            ",
        )?;
        Ok(())
    }

    fn write_records(&mut self, records: &[StoredRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let synced_at = Utc::now().to_rfc3339();

        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO tweets
                (tweet_id, author_id, created_at, text, conversation_id, thread_root_id,
                 permalink, media_urls, media_types, is_quote, raw, synced_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(tweet_id) DO UPDATE SET
                    author_id = excluded.author_id,
                    created_at = excluded.created_at,
                    text = excluded.text,
                    conversation_id = excluded.conversation_id,
                    thread_root_id = excluded.thread_root_id,
                    permalink = excluded.permalink,
                    media_urls = excluded.media_urls,
                    media_types = excluded.media_types,
                    is_quote = excluded.is_quote,
                    raw = excluded.raw,
                    synced_at = excluded.synced_at
                ",
            )?;

            for record in records {
                stmt.execute(params![
                    record.tweet_id,
                    record.author_id,
                    record.created_at,
                    record.text,
                    record.conversation_id,
                    record.thread_root_id,
                    record.permalink,
                    serde_json::to_string(&record.media_urls)?,
                    serde_json::to_string(&record.media_types)?,
                    i32::from(record.is_quote),
                    serde_json::to_string(&record.raw)?,
                    synced_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }

    /// Fetch a stored record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored JSON column is corrupt.
    pub fn get_record(&self, tweet_id: &str) -> Result<Option<StoredRecord>> {
        let row = self
            .conn
            .query_row(
                r"
                SELECT tweet_id, author_id, created_at, text, conversation_id, thread_root_id,
                       permalink, media_urls, media_types, is_quote, raw
                FROM tweets WHERE tweet_id = ?
                ",
                params![tweet_id],
                RawRow::from_row,
            )
            .optional()?;

        row.map(RawRow::into_record).transpose()
    }

    /// All records sharing a thread root, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored JSON column is corrupt.
    pub fn get_thread(&self, thread_root_id: &str) -> Result<Vec<StoredRecord>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT tweet_id, author_id, created_at, text, conversation_id, thread_root_id,
                   permalink, media_urls, media_types, is_quote, raw
            FROM tweets WHERE thread_root_id = ?
            ORDER BY created_at ASC, tweet_id ASC
            ",
        )?;
        let rows = stmt
            .query_map(params![thread_root_id], RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(RawRow::into_record).collect()
    }

    /// Total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn record_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM tweets", [], |row| row.get(0))?)
    }

    /// Number of stored quote records.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn quote_count(&self) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM tweets WHERE is_quote = 1",
            [],
            |row| row.get(0),
        )?)
    }
}

impl SyncStore for SqliteStore {
    fn last_synced_post(&self) -> Result<Option<Watermark>> {
        Ok(self
            .conn
            .query_row(
                r"
                SELECT tweet_id, created_at FROM tweets
                WHERE is_quote = 0
                ORDER BY created_at DESC
                LIMIT 1
                ",
                [],
                |row| {
                    Ok(Watermark {
                        tweet_id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn upsert(&mut self, records: &[StoredRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let count = self
            .write_records(records)
            .map_err(|e| XsyncError::persist(e.to_string()))?;
        info!("Stored {} records", count);
        Ok(count)
    }
}

/// Row as stored, before JSON columns are decoded.
struct RawRow {
    tweet_id: String,
    author_id: String,
    created_at: String,
    text: String,
    conversation_id: Option<String>,
    thread_root_id: String,
    permalink: String,
    media_urls: String,
    media_types: String,
    is_quote: bool,
    raw: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tweet_id: row.get(0)?,
            author_id: row.get(1)?,
            created_at: row.get(2)?,
            text: row.get(3)?,
            conversation_id: row.get(4)?,
            thread_root_id: row.get(5)?,
            permalink: row.get(6)?,
            media_urls: row.get(7)?,
            media_types: row.get(8)?,
            is_quote: row.get::<_, i32>(9)? != 0,
            raw: row.get(10)?,
        })
    }

    fn into_record(self) -> Result<StoredRecord> {
        Ok(StoredRecord {
            tweet_id: self.tweet_id,
            author_id: self.author_id,
            created_at: self.created_at,
            text: self.text,
            conversation_id: self.conversation_id,
            thread_root_id: self.thread_root_id,
            permalink: self.permalink,
            media_urls: serde_json::from_str(&self.media_urls)?,
            media_types: serde_json::from_str(&self.media_types)?,
            is_quote: self.is_quote,
            raw: serde_json::from_str(&self.raw)?,
        })
    }
}
