//! CLI definitions for xsync.
//!
//! Uses clap for argument parsing with derive macros.

use crate::config::StoreBackend;
use crate::logging::LogLevel;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// xsync - Mirror an X account's posts into a relational store
#[derive(Parser, Debug)]
#[command(name = "xsync")]
#[command(version)]
#[command(about = "Incrementally mirror an X account's posts into a relational store")]
#[command(long_about = r#"
xsync fetches an X account's recent posts and upserts them into SQLite or
Supabase, one row per post. Each run picks up where the last one left off,
resolves thread roots within the fetched window, and stores quoted posts as
standalone records.

Quick start:
  1. export X_BEARER_TOKEN=... X_USERNAME=yourhandle
  2. Run: xsync sync
  3. Inspect: xsync status

Schedule 'xsync sync' with cron or a CI job; it is safe to re-run.
"#)]
pub struct Cli {
    /// Path to a config file (default: ~/.config/xsync/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Be verbose (show debug info)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Be quiet (suppress non-error output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Log level: error, warn, info, debug, trace, or off (overrides -v/-q for logs)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch new posts and upsert them
    Sync(SyncArgs),

    /// Show what the local database holds
    Status,

    /// Show or manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync even if the last synced post is newer than the interval
    #[arg(long)]
    pub force: bool,

    /// Build records without writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Storage backend (overrides XSYNC_STORE)
    #[arg(long, value_enum)]
    pub store: Option<StoreArg>,

    /// Days to look back when nothing has been synced yet (overrides SYNC_DAYS)
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration (secrets masked)
    #[arg(long)]
    pub show: bool,

    /// Print the config file path
    #[arg(long)]
    pub path: bool,

    /// Write a default config file if none exists
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreArg {
    Sqlite,
    Supabase,
}

impl From<StoreArg> for StoreBackend {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Sqlite => Self::Sqlite,
            StoreArg::Supabase => Self::Supabase,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::parse_from([
            "xsync", "--db", "/tmp/x.db", "sync", "--force", "--store", "supabase", "--days", "3",
        ]);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.db")));
        match cli.command {
            Commands::Sync(args) => {
                assert!(args.force);
                assert!(!args.dry_run);
                assert_eq!(args.store, Some(StoreArg::Supabase));
                assert_eq!(args.days, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_log_level() {
        let cli = Cli::parse_from(["xsync", "--log-level", "warn", "status"]);
        assert_eq!(cli.log_level, Some(LogLevel::Warn));
        assert!(Cli::try_parse_from(["xsync", "--log-level", "loud", "status"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["xsync", "status", "--format", "json", "-q"]);
        assert!(cli.quiet);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
