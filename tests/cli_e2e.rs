//! End-to-end CLI tests for xsync.
//!
//! These tests run the actual xsync binary and verify:
//! - Command-line interface behavior
//! - Output format and content
//! - Error handling and messages
//!
//! # Test Organization
//!
//! - `test_sync_*` - Sync command tests (against a mock X API)
//! - `test_status_*` - Status command tests
//! - `test_config_*` - Config command tests
//! - `test_cli_*` - General CLI tests (flags, help, version)

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use mockito::{Matcher, Mock, ServerGuard};
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

/// Log a test event with timestamp
macro_rules! test_log {
    ($($arg:tt)*) => {
        let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f");
        eprintln!("[TEST {}] {}", timestamp, format!($($arg)*));
    };
}

const SCRUBBED_ENV: &[&str] = &[
    "X_BEARER_TOKEN",
    "X_USERNAME",
    "X_API_BASE",
    "PROXY_URL",
    "SYNC_DAYS",
    "SYNC_INTERVAL_DAYS",
    "XSYNC_STORE",
    "XSYNC_DB",
    "SUPABASE_URL",
    "SUPABASE_SERVICE_ROLE_KEY",
    "RUST_LOG",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
];

/// Scratch directory holding the config file and database for one test.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    fn db_path(&self) -> PathBuf {
        self.dir.path().join("data").join("xsync.db")
    }

    /// The xsync command, isolated from the caller's environment.
    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("xsync");
        for key in SCRUBBED_ENV {
            cmd.env_remove(key);
        }
        cmd.current_dir(self.dir.path())
            .env("NO_COLOR", "1")
            .arg("--config")
            .arg(self.config_path())
            .arg("--db")
            .arg(self.db_path());
        cmd
    }

    /// The xsync command with credentials pointing at `server`.
    fn sync_cmd(&self, server: &ServerGuard) -> Command {
        let mut cmd = self.cmd();
        cmd.env("X_BEARER_TOKEN", "test-token")
            .env("X_USERNAME", "alice")
            .env("X_API_BASE", server.url());
        cmd
    }
}

fn mock_lookup(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/users/by/username/alice")
        .match_header("authorization", "Bearer test-token")
        .with_status(200)
        .with_body(r#"{"data":{"id":"42","name":"Alice","username":"alice"}}"#)
        .create()
}

fn mock_timeline(server: &mut ServerGuard, body: &str) -> Mock {
    server
        .mock("GET", "/users/42/tweets")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body)
        .create()
}

// =============================================================================
// Sample Test Data
// =============================================================================

const SAMPLE_TIMELINE: &str = r#"{
    "data": [
        {"id": "1002", "text": "and a follow-up", "created_at": "2025-01-09T10:00:00.000Z",
         "conversation_id": "1001", "author_id": "42"},
        {"id": "1001", "text": "thread start, quoting Bob", "created_at": "2025-01-09T09:00:00.000Z",
         "conversation_id": "1001", "author_id": "42",
         "attachments": {"media_keys": ["3_1"]},
         "referenced_tweets": [{"type": "quoted", "id": "500"}]}
    ],
    "includes": {
        "media": [{"media_key": "3_1", "type": "photo", "url": "https://pbs.example/1.jpg"}],
        "tweets": [
            {"id": "500", "text": "the quoted post", "created_at": "2025-01-01T00:00:00.000Z", "author_id": "7"}
        ],
        "users": [
            {"id": "42", "name": "Alice", "username": "alice"},
            {"id": "7", "name": "Bob", "username": "bob"}
        ]
    },
    "meta": {"result_count": 2}
}"#;

const EMPTY_TIMELINE: &str = r#"{"meta":{"result_count":0}}"#;

// =============================================================================
// CLI Tests
// =============================================================================

#[test]
fn test_cli_help() {
    test_log!("Starting test_cli_help");
    let ws = Workspace::new();
    ws.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_cli_version() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_no_args() {
    let ws = Workspace::new();
    ws.cmd().assert().failure();
}

#[test]
fn test_cli_invalid_command() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("frobnicate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_completions() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("xsync"));
}

#[test]
fn test_cli_log_level_controls_stderr() {
    let ws = Workspace::new();
    let mut server = mockito::Server::new();
    mock_lookup(&mut server);
    mock_timeline(&mut server, EMPTY_TIMELINE);

    ws.sync_cmd(&server)
        .args(["--log-level", "info", "sync"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Starting operation"));

    ws.sync_cmd(&server)
        .args(["--log-level", "off", "sync"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Starting operation").not());
}

// =============================================================================
// Sync Tests
// =============================================================================

#[test]
fn test_sync_missing_token() {
    test_log!("Starting test_sync_missing_token");
    let ws = Workspace::new();
    ws.cmd()
        .env("X_USERNAME", "alice")
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("X_BEARER_TOKEN is required"));
    assert!(!ws.db_path().exists());
}

#[test]
fn test_sync_invalid_sync_days() {
    let ws = Workspace::new();
    ws.cmd()
        .env("X_BEARER_TOKEN", "t")
        .env("X_USERNAME", "alice")
        .env("SYNC_DAYS", "seven")
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SYNC_DAYS"));
}

#[test]
fn test_sync_oversized_lookback_is_config_error() {
    let ws = Workspace::new();
    ws.cmd()
        .env("X_BEARER_TOKEN", "t")
        .env("X_USERNAME", "alice")
        .args(["sync", "--days", "4000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"))
        .stderr(predicate::str::contains("SYNC_DAYS must be at most"));
    assert!(!ws.db_path().exists());
}

#[test]
fn test_sync_reads_dotenv_file() {
    let ws = Workspace::new();
    fs::write(ws.dir.path().join(".env"), "SYNC_DAYS=seven\n").unwrap();
    ws.cmd()
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SYNC_DAYS must be a positive integer"));
}

#[test]
fn test_sync_json_output() {
    test_log!("Starting test_sync_json_output");
    let ws = Workspace::new();
    let mut server = mockito::Server::new();
    let lookup = mock_lookup(&mut server);
    let timeline = mock_timeline(&mut server, SAMPLE_TIMELINE);

    let output = ws
        .sync_cmd(&server)
        .args(["--format", "json", "sync"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["fetched"], 2);
    assert_eq!(report["own_records"], 2);
    assert_eq!(report["quoted_records"], 1);
    assert_eq!(report["upserted"], 3);
    assert_eq!(report["skipped"], false);
    assert!(ws.db_path().exists());

    lookup.assert();
    timeline.assert();
}

#[test]
fn test_sync_text_output_and_rerun() {
    let ws = Workspace::new();
    let mut server = mockito::Server::new();
    mock_lookup(&mut server);
    let first = server
        .mock("GET", "/users/42/tweets")
        .match_query(Matcher::Regex("start_time=".into()))
        .with_status(200)
        .with_body(SAMPLE_TIMELINE)
        .create();
    let second = server
        .mock("GET", "/users/42/tweets")
        .match_query(Matcher::UrlEncoded("since_id".into(), "1002".into()))
        .with_status(200)
        .with_body(EMPTY_TIMELINE)
        .create();

    ws.sync_cmd(&server)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetched 2 posts"))
        .stdout(predicate::str::contains("Upserted 3 records"));

    ws.sync_cmd(&server)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fetched 0 posts (since 1002)"));

    first.assert();
    second.assert();
}

#[test]
fn test_sync_dry_run_writes_nothing() {
    let ws = Workspace::new();
    let mut server = mockito::Server::new();
    mock_lookup(&mut server);
    mock_timeline(&mut server, SAMPLE_TIMELINE);

    ws.sync_cmd(&server)
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));

    ws.cmd()
        .args(["--format", "json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""records":0"#));
}

#[test]
fn test_sync_interval_skips() {
    let ws = Workspace::new();
    let mut server = mockito::Server::new();
    mock_lookup(&mut server);
    let timeline = mock_timeline(&mut server, SAMPLE_TIMELINE);

    ws.sync_cmd(&server).arg("sync").assert().success();

    // The newest post is from 2025; an interval in the thousands of days
    // keeps it "recent".
    ws.sync_cmd(&server)
        .env("SYNC_INTERVAL_DAYS", "100000")
        .args(["--format", "json", "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""skipped":true"#));

    timeline.assert();
}

#[test]
fn test_sync_upstream_unauthorized() {
    let ws = Workspace::new();
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/users/by/username/alice")
        .with_status(401)
        .with_body(r#"{"title":"Unauthorized"}"#)
        .create();

    ws.sync_cmd(&server)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("401"))
        .stderr(predicate::str::contains("X_BEARER_TOKEN"));
}

// =============================================================================
// Status Tests
// =============================================================================

#[test]
fn test_status_nonexistent_db() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database"));
}

#[test]
fn test_status_after_sync() {
    let ws = Workspace::new();
    let mut server = mockito::Server::new();
    mock_lookup(&mut server);
    mock_timeline(&mut server, SAMPLE_TIMELINE);
    ws.sync_cmd(&server).arg("sync").assert().success();

    ws.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Records:"))
        .stdout(predicate::str::contains("1002"))
        .stdout(predicate::str::contains("2 posts from 1001"));

    let output = ws.cmd().args(["--format", "json", "status"]).output().unwrap();
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["records"], 3);
    assert_eq!(status["quotes"], 1);
    assert_eq!(status["watermark"]["tweet_id"], "1002");
    assert_eq!(status["latest_thread"], serde_json::json!(["1001", "1002"]));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_path() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_writes_defaults() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let content = fs::read_to_string(ws.config_path()).unwrap();
    assert!(content.contains("[sync]"));
    assert!(content.contains("lookback_days = 7"));

    ws.cmd()
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_config_show_masks_secrets() {
    let ws = Workspace::new();
    fs::write(ws.config_path(), "[x]\nusername = \"alice\"\n").unwrap();

    ws.cmd()
        .env("X_BEARER_TOKEN", "super-secret-token")
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alice"))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("super-secret-token").not());
}

#[test]
fn test_config_invalid_file() {
    let ws = Workspace::new();
    fs::write(ws.config_path(), "[sync\nlookback_days =").unwrap();

    ws.cmd()
        .args(["config", "--show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}
