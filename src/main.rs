//! xsync - Mirror an X account's posts into a relational store
//!
//! Main entry point for the xsync command-line tool.

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use serde::Serialize;
use std::io;
use std::process::ExitCode;
use tracing::debug;

use xsync::config::{Config, StoreBackend};
use xsync::logging::{OperationGuard, init_cli_logging};
use xsync::source::{XClient, XClientOptions};
use xsync::store::{SqliteStore, SupabaseStore, SyncStore};
use xsync::sync::{SyncOptions, Syncer};
use xsync::*;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let colors = std::env::var_os("NO_COLOR").is_none();
    if !colors {
        colored::control::set_override(false);
    }
    init_cli_logging(cli.quiet, cli.verbose, colors, cli.log_level);

    let result = match &cli.command {
        Commands::Sync(args) => cmd_sync(&cli, args),
        Commands::Status => cmd_status(&cli),
        Commands::Config(args) => cmd_config(&cli, args),
        Commands::Completions(args) => {
            cmd_completions(args);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let title = if err.is_config_error() {
                "Configuration error"
            } else {
                "Command failed"
            };
            let suggestions: Vec<&str> = err.suggestion().into_iter().collect();
            eprintln!("{}", format_error(title, &err.to_string(), &suggestions));
            ExitCode::FAILURE
        }
    }
}

/// Load config from file and environment, then apply global CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.store.db = Some(db.clone());
    }
    Ok(config)
}

fn print_json<T: Serialize>(format: OutputFormat, value: &T) -> Result<()> {
    let json = if format == OutputFormat::JsonPretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

fn cmd_sync(cli: &Cli, args: &SyncArgs) -> Result<()> {
    let mut config = load_config(cli)?;
    if let Some(store) = args.store {
        config.store.backend = store.into();
    }
    if let Some(days) = args.days {
        config.sync.lookback_days = days;
    }
    config.validate()?;

    let handle = config.x.username.clone().unwrap_or_default();
    let source = XClient::new(XClientOptions {
        bearer_token: config.x.bearer_token.clone().unwrap_or_default(),
        api_base: config.x.api_base.clone(),
        proxy_url: config.x.proxy_url.clone(),
        timeout: config.timeout(),
    })?;

    let options = SyncOptions {
        handle,
        lookback_days: config.sync.lookback_days,
        interval_days: config.sync.interval_days,
        force: args.force,
        dry_run: args.dry_run,
    };

    let guard = OperationGuard::new("sync");
    let outcome = match config.store.backend {
        StoreBackend::Sqlite => {
            let db_path = config.db_path();
            debug!("Using SQLite store at {}", db_path.display());
            let mut store = SqliteStore::open(&db_path)?;
            run_sync(&source, &mut store, options)
        }
        StoreBackend::Supabase => {
            let mut store = SupabaseStore::new(
                config.store.supabase_url.as_deref().unwrap_or_default(),
                config.store.supabase_key.as_deref().unwrap_or_default(),
                config.timeout(),
            )?
            .with_table(config.store.table.clone());
            run_sync(&source, &mut store, options)
        }
    };

    let report = match outcome {
        Ok(report) => {
            guard.complete();
            report
        }
        Err(err) => {
            guard.fail(&err);
            return Err(err);
        }
    };

    match cli.format {
        OutputFormat::Json | OutputFormat::JsonPretty => print_json(cli.format, &report)?,
        OutputFormat::Text if cli.quiet => {}
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn run_sync<T: SyncStore>(
    source: &XClient,
    store: &mut T,
    options: SyncOptions,
) -> Result<SyncReport> {
    Syncer::new(source, store, options).run()
}

fn print_report(report: &SyncReport) {
    if report.skipped {
        println!(
            "{} Last synced post is within the sync interval; nothing to do.",
            "•".dimmed()
        );
        return;
    }

    let cursor = report
        .since_id
        .as_deref()
        .map_or_else(|| "lookback window".to_string(), |id| format!("since {id}"));
    println!(
        "  {} Fetched {} posts ({cursor})",
        "✓".green(),
        format_number_usize(report.fetched)
    );
    if report.fetched == 0 {
        return;
    }
    println!(
        "  {} Built {} own and {} quoted records",
        "✓".green(),
        report.own_records,
        report.quoted_records
    );
    if report.dry_run {
        println!("  {} Dry run: nothing written", "•".yellow());
    } else {
        println!(
            "  {} Upserted {} records",
            "✓".green(),
            format_number_usize(report.upserted)
        );
    }
}

#[derive(Serialize)]
struct StatusReport {
    database: String,
    records: i64,
    quotes: i64,
    watermark: Option<Watermark>,
    /// Ids of the thread holding the newest own post, oldest first.
    latest_thread: Vec<String>,
}

fn cmd_status(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    if config.store.backend != StoreBackend::Sqlite {
        return Err(XsyncError::config(
            "status reads the local SQLite database; set XSYNC_STORE=sqlite or pass --db",
        ));
    }

    let db_path = config.db_path();
    if !db_path.exists() {
        return Err(XsyncError::config(format!(
            "No database at {}. Run 'xsync sync' first.",
            db_path.display()
        )));
    }

    let store = SqliteStore::open(&db_path)?;
    let watermark = store.last_synced_post()?;
    let latest_thread = match &watermark {
        Some(mark) => match store.get_record(&mark.tweet_id)? {
            Some(record) => store
                .get_thread(&record.thread_root_id)?
                .into_iter()
                .map(|r| r.tweet_id)
                .collect(),
            None => Vec::new(),
        },
        None => Vec::new(),
    };
    let status = StatusReport {
        database: db_path.display().to_string(),
        records: store.record_count()?,
        quotes: store.quote_count()?,
        watermark,
        latest_thread,
    };

    match cli.format {
        OutputFormat::Json | OutputFormat::JsonPretty => print_json(cli.format, &status)?,
        OutputFormat::Text => {
            println!("{}", "Sync Status".bold().cyan());
            println!("{}", "─".repeat(HEADER_DIVIDER_WIDTH));
            println!("  {:<16} {}", "Database:", status.database);
            println!("  {:<16} {:>10}", "Records:", format_number(status.records));
            println!("  {:<16} {:>10}", "Quoted posts:", format_number(status.quotes));
            match &status.watermark {
                Some(mark) => {
                    let when = chrono::DateTime::parse_from_rfc3339(&mark.created_at).map_or_else(
                        |_| mark.created_at.clone(),
                        |dt| format_relative_date(dt.with_timezone(&chrono::Utc)),
                    );
                    println!("  {:<16} {} ({})", "Last synced:", mark.tweet_id, when.green());
                    if let Some(root) = status.latest_thread.first() {
                        println!(
                            "  {:<16} {} posts from {root}",
                            "Latest thread:",
                            status.latest_thread.len()
                        );
                    }
                }
                None => println!("  {:<16} {}", "Last synced:", "never".yellow()),
            }
        }
    }
    Ok(())
}

fn cmd_config(cli: &Cli, args: &ConfigArgs) -> Result<()> {
    let path = cli
        .config
        .clone()
        .or_else(Config::user_config_path)
        .ok_or_else(|| XsyncError::config("Could not determine config directory"))?;

    if args.path {
        println!("{}", path.display());
    }

    if args.init {
        if path.exists() {
            println!("{} Config already exists at {}", "•".dimmed(), path.display());
        } else {
            Config::default().save_to(&path)?;
            println!("{} Wrote {}", "✓".green(), path.display());
        }
    }

    if args.show || !(args.path || args.init) {
        let config = load_config(cli)?.redacted();
        match cli.format {
            OutputFormat::Json | OutputFormat::JsonPretty => print_json(cli.format, &config)?,
            OutputFormat::Text => {
                println!("{}", "Current Configuration".bold().cyan());
                println!("  Config file: {}", path.display());
                println!("  Database:    {}", config.db_path().display());
                println!("{}", "─".repeat(HEADER_DIVIDER_WIDTH));
                print!(
                    "{}",
                    toml::to_string_pretty(&config).map_err(anyhow::Error::from)?
                );
            }
        }
    }
    Ok(())
}

fn cmd_completions(args: &CompletionsArgs) {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "xsync", &mut io::stdout());
}
