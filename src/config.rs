//! Configuration system for xsync.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Sensible defaults built into the binary
//! 2. **User config file** - `~/.config/xsync/config.toml`
//! 3. **Environment variables** - including a `.env` file in the working
//!    directory
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [x]
//! username = "alice"
//! bearer_token = "AAAA..."
//!
//! [sync]
//! lookback_days = 7
//! interval_days = 1.0
//!
//! [store]
//! backend = "sqlite"
//! db = "~/.local/share/xsync/xsync.db"
//! ```

use crate::error::{Result, ResultExt, XsyncError};
use crate::source::DEFAULT_API_BASE;
use crate::store::DEFAULT_TABLE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Largest accepted `lookback_days`.
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

/// Main configuration structure for xsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// X API access.
    pub x: XConfig,
    /// Sync window and cadence.
    pub sync: SyncConfig,
    /// Where records are persisted.
    pub store: StoreConfig,
}

/// X API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XConfig {
    /// App-only bearer token.
    /// Environment variable: `X_BEARER_TOKEN`
    pub bearer_token: Option<String>,

    /// Handle of the account to mirror, without the `@`.
    /// Environment variable: `X_USERNAME`
    pub username: Option<String>,

    /// API base URL.
    /// Environment variable: `X_API_BASE`
    pub api_base: String,

    /// Proxy for X API requests.
    /// Environment variable: `PROXY_URL`
    pub proxy_url: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Sync window and cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// How far back the first sync reaches, in days.
    /// Environment variable: `SYNC_DAYS`
    pub lookback_days: u32,

    /// Minimum days between the newest synced post and the next sync.
    /// Zero syncs on every run.
    /// Environment variable: `SYNC_INTERVAL_DAYS`
    pub interval_days: f64,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Supabase,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "supabase" => Ok(Self::Supabase),
            _ => Err(format!("Invalid store backend: {s}")),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Supabase => write!(f, "supabase"),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which backend receives records.
    /// Environment variable: `XSYNC_STORE`
    pub backend: StoreBackend,

    /// Path to the `SQLite` database file.
    /// Environment variable: `XSYNC_DB`
    pub db: Option<PathBuf>,

    /// Supabase project URL.
    /// Environment variable: `SUPABASE_URL`
    pub supabase_url: Option<String>,

    /// Supabase service-role key.
    /// Environment variable: `SUPABASE_SERVICE_ROLE_KEY`
    pub supabase_key: Option<String>,

    /// Table holding synced posts.
    pub table: String,
}

impl Default for XConfig {
    fn default() -> Self {
        Self {
            bearer_token: None,
            username: None,
            api_base: DEFAULT_API_BASE.to_string(),
            proxy_url: None,
            timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            interval_days: 0.0,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            db: None,
            supabase_url: None,
            supabase_key: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (after loading `.env`)
    /// 2. Config file (`path`, or ~/.config/xsync/config.toml)
    /// 3. Compiled defaults
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed,
    /// or an environment variable holds an unparseable value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }

        let mut config = match path.map(Path::to_path_buf).or_else(Self::user_config_path) {
            Some(file) => Self::load_from_file(&file)?.unwrap_or_default(),
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        debug!("Configuration loaded: {:?}", config.redacted());
        Ok(config)
    }

    /// Load configuration from a specific file. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!("Config file not found: {}", path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content).map_err(|e| XsyncError::ConfigFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(Some(config))
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("xsync").join("config.toml"))
    }

    /// Apply overrides from an environment lookup.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a numeric or enum variable does not
    /// parse.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("X_BEARER_TOKEN") {
            self.x.bearer_token = Some(token);
        }
        if let Some(username) = non_empty("X_USERNAME") {
            self.x.username = Some(username);
        }
        if let Some(base) = non_empty("X_API_BASE") {
            self.x.api_base = base;
        }
        if let Some(proxy) = non_empty("PROXY_URL") {
            self.x.proxy_url = Some(proxy);
        }

        if let Some(days) = non_empty("SYNC_DAYS") {
            self.sync.lookback_days = days.trim().parse().map_err(|_| {
                XsyncError::config(format!("SYNC_DAYS must be a positive integer, got '{days}'"))
            })?;
        }
        if let Some(days) = non_empty("SYNC_INTERVAL_DAYS") {
            self.sync.interval_days = days.trim().parse().map_err(|_| {
                XsyncError::config(format!(
                    "SYNC_INTERVAL_DAYS must be a non-negative number, got '{days}'"
                ))
            })?;
        }

        if let Some(backend) = non_empty("XSYNC_STORE") {
            self.store.backend = backend.parse().map_err(XsyncError::config)?;
        }
        if let Some(db) = non_empty("XSYNC_DB") {
            self.store.db = Some(PathBuf::from(db));
        }
        if let Some(url) = non_empty("SUPABASE_URL") {
            self.store.supabase_url = Some(url);
        }
        if let Some(key) = non_empty("SUPABASE_SERVICE_ROLE_KEY") {
            self.store.supabase_key = Some(key);
        }

        Ok(())
    }

    /// Check that every setting needed for a sync is present and sane.
    ///
    /// # Errors
    ///
    /// Returns [`XsyncError::Config`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.x.bearer_token.as_deref().is_none_or(str::is_empty) {
            return Err(XsyncError::config("X_BEARER_TOKEN is required"));
        }
        match self.x.username.as_deref() {
            None | Some("") => return Err(XsyncError::config("X_USERNAME is required")),
            Some(name) if name.starts_with('@') => {
                return Err(XsyncError::config(
                    "X_USERNAME must be the bare handle, without '@'",
                ));
            }
            Some(_) => {}
        }
        require_http_url("X_API_BASE", &self.x.api_base)?;
        if let Some(proxy) = &self.x.proxy_url {
            if !proxy.contains("://") {
                return Err(XsyncError::config(format!(
                    "PROXY_URL must include a scheme, got '{proxy}'"
                )));
            }
        }

        if self.sync.lookback_days == 0 {
            return Err(XsyncError::config("SYNC_DAYS must be a positive integer"));
        }
        if self.sync.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(XsyncError::config(format!(
                "SYNC_DAYS must be at most {MAX_LOOKBACK_DAYS}, got {}",
                self.sync.lookback_days
            )));
        }
        if !self.sync.interval_days.is_finite() || self.sync.interval_days < 0.0 {
            return Err(XsyncError::config(
                "SYNC_INTERVAL_DAYS must be a non-negative number",
            ));
        }

        if self.store.backend == StoreBackend::Supabase {
            let url = self
                .store
                .supabase_url
                .as_deref()
                .ok_or_else(|| XsyncError::config("SUPABASE_URL is required for the supabase store"))?;
            require_http_url("SUPABASE_URL", url)?;
            if self.store.supabase_key.as_deref().is_none_or(str::is_empty) {
                return Err(XsyncError::config(
                    "SUPABASE_SERVICE_ROLE_KEY is required for the supabase store",
                ));
            }
        }

        Ok(())
    }

    /// Get the database path, using defaults if not configured.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.store.db.clone().unwrap_or_else(crate::default_db_path)
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.x.timeout_secs)
    }

    /// Copy with secrets masked, for display and logging.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some("********".to_string());
            }
        };
        mask(&mut copy.x.bearer_token);
        mask(&mut copy.store.supabase_key);
        copy
    }

    /// Save the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).map_err(anyhow::Error::from)?;
        std::fs::write(path, content).context("Failed to write config file")?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Generate a default configuration file content.
    #[must_use]
    pub fn default_config_content() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn require_http_url(name: &str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(XsyncError::config(format!(
            "{name} must be an http(s) URL, got '{value}'"
        )))
    }
}
