//! Custom error types for xsync.
//!
//! Every failure in a run is fatal: the binary reports it and exits non-zero,
//! leaving retries to whatever scheduler triggered the run.

use thiserror::Error;

/// Primary error type for xsync operations.
#[derive(Error, Debug)]
pub enum XsyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Missing or invalid setting. Raised before any I/O happens.
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Configuration file could not be parsed.
    #[error("Failed to parse config file '{path}': {reason}")]
    ConfigFile { path: String, reason: String },

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    /// Non-success response from the post source or the watermark read.
    #[error("Upstream error {status}: {body}")]
    UpstreamFetch { status: u16, body: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// The store rejected the upsert; nothing from the batch is assumed
    /// persisted.
    #[error("Upsert failed: {reason}")]
    Persist { reason: String },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored schema is newer than this binary understands.
    #[error("Database schema version mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: i32, found: i32 },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// JSON encode/decode failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File read/write error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for other errors with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for xsync operations.
pub type Result<T> = std::result::Result<T, XsyncError>;

impl XsyncError {
    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create an upstream fetch error from a status code and response body.
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::UpstreamFetch {
            status,
            body: body.into(),
        }
    }

    /// Create a persist error.
    pub fn persist(reason: impl Into<String>) -> Self {
        Self::Persist {
            reason: reason.into(),
        }
    }

    /// Wrap an error with additional context.
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True when the run failed before touching the network or the store.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::ConfigFile { .. })
    }

    /// Get a suggestion for how to fix this error, if applicable.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config { .. } => Some(
                "Set the missing values in the environment, a .env file, or 'xsync config --path'.",
            ),
            Self::ConfigFile { .. } => {
                Some("Fix the TOML syntax or regenerate the file with 'xsync config --init'.")
            }
            Self::UpstreamFetch { status: 401 | 403, .. } => {
                Some("Check that X_BEARER_TOKEN is valid and has read access.")
            }
            Self::UpstreamFetch { status: 429, .. } => {
                Some("Rate limited by the X API. Wait for the window to reset and run again.")
            }
            Self::SchemaMismatch { .. } => {
                Some("The database was written by a newer xsync. Upgrade xsync or use another --db.")
            }
            _ => None,
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily (only evaluated on error).
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with additional context.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| XsyncError::with_context(context, e))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| XsyncError::with_context(f(), e))
    }
}

// =============================================================================
// CLI Error Formatting
// =============================================================================

use colored::Colorize;

/// Format a structured CLI error with explanation and suggestions.
#[must_use]
pub fn format_error(title: &str, explanation: &str, suggestions: &[&str]) -> String {
    use std::fmt::Write;

    let mut output = format!("{} {}", "✗".red().bold(), title.bold());

    if !explanation.is_empty() {
        let _ = write!(output, "\n\n   {explanation}");
    }

    if !suggestions.is_empty() {
        output.push_str("\n\n   ");
        if suggestions.len() == 1 {
            let _ = write!(output, "{} {}", "Hint:".cyan(), suggestions[0]);
        } else {
            let _ = write!(output, "{}:", "Try".cyan());
            for suggestion in suggestions {
                let _ = write!(output, "\n     {} {}", "•".dimmed(), suggestion);
            }
        }
    }

    output
}
