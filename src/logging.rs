//! Logging setup for xsync.
//!
//! Uses the `tracing` ecosystem. `RUST_LOG` takes precedence over the
//! configured level when set.
//!
//! # Usage
//!
//! ```rust
//! use xsync::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::default());
//! tracing::info!("Sync started");
//! ```

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display.
    pub level: LogLevel,
    /// Output format for log messages.
    pub format: LogFormat,
    /// Include timestamps in log output.
    pub timestamps: bool,
    /// Include target (module path) in log output.
    pub target: bool,
    /// Enable ANSI colors in output.
    pub colors: bool,
}

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    Off,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Compact single-line format.
    Compact,
    /// Full format with span events, file and line.
    Full,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            timestamps: true,
            target: false,
            colors: true,
        }
    }
}

impl LogConfig {
    /// Errors only.
    #[must_use]
    pub const fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            format: LogFormat::Compact,
            timestamps: false,
            target: false,
            colors: true,
        }
    }

    /// Debug level with module targets.
    #[must_use]
    pub const fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            timestamps: true,
            target: true,
            colors: true,
        }
    }

    /// Everything, including span enter/exit.
    #[must_use]
    pub const fn trace() -> Self {
        Self {
            level: LogLevel::Trace,
            format: LogFormat::Full,
            timestamps: true,
            target: true,
            colors: true,
        }
    }

    /// Disable ANSI colors (for log files and `NO_COLOR`).
    #[must_use]
    pub const fn without_colors(mut self) -> Self {
        self.colors = false;
        self
    }
}

impl LogLevel {
    const fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
            Self::Off => "off",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" | "e" => Ok(Self::Error),
            "warn" | "warning" | "w" => Ok(Self::Warn),
            "info" | "i" => Ok(Self::Info),
            "debug" | "d" => Ok(Self::Debug),
            "trace" | "t" => Ok(Self::Trace),
            "off" | "none" | "quiet" => Ok(Self::Off),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

/// Initialize the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LogConfig) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("xsync={}", config.level.to_filter_string()))
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(config.colors)
                    .with_target(config.target)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
        (LogFormat::Pretty, false) => registry
            .with(
                fmt::layer()
                    .pretty()
                    .without_time()
                    .with_ansi(config.colors)
                    .with_target(config.target)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
        (LogFormat::Compact, true) => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(config.colors)
                    .with_target(config.target)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
        (LogFormat::Compact, false) => registry
            .with(
                fmt::layer()
                    .compact()
                    .without_time()
                    .with_ansi(config.colors)
                    .with_target(config.target)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
        (LogFormat::Full, _) => registry
            .with(
                fmt::layer()
                    .with_ansi(config.colors)
                    .with_target(config.target)
                    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
    };
}

/// Pick the logging config for CLI flags. An explicit `--log-level` wins
/// over `--quiet` and `--verbose`.
#[must_use]
pub fn cli_log_config(
    quiet: bool,
    verbose: bool,
    colors: bool,
    level: Option<LogLevel>,
) -> LogConfig {
    let config = match level {
        Some(LogLevel::Trace) => LogConfig::trace(),
        Some(level) => {
            let mut config = if verbose {
                LogConfig::verbose()
            } else {
                LogConfig::default()
            };
            config.level = level;
            config
        }
        None if quiet => LogConfig::quiet(),
        None if verbose => LogConfig::verbose(),
        None => LogConfig::default(),
    };
    if colors { config } else { config.without_colors() }
}

/// Initialize logging with defaults suitable for CLI use.
pub fn init_cli_logging(quiet: bool, verbose: bool, colors: bool, level: Option<LogLevel>) {
    init_logging(&cli_log_config(quiet, verbose, colors, level));
}

/// Logs the start and end of an operation with its duration.
pub struct OperationGuard {
    name: String,
    start: std::time::Instant,
}

impl OperationGuard {
    /// Start tracking an operation.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        tracing::info!(operation = %name, "Starting operation");
        Self {
            name,
            start: std::time::Instant::now(),
        }
    }

    /// Complete the operation successfully.
    pub fn complete(self) {
        tracing::info!(
            operation = %self.name,
            duration_ms = self.start.elapsed().as_millis(),
            "Operation completed"
        );
    }

    /// Mark the operation as failed.
    pub fn fail(self, error: &dyn std::error::Error) {
        tracing::error!(
            operation = %self.name,
            duration_ms = self.start.elapsed().as_millis(),
            error = %error,
            "Operation failed"
        );
    }
}
