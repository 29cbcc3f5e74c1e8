//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end against a
//! fresh data directory. No test needs a reachable server.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Unroutable server so nothing leaves the machine
const OFFLINE_SERVER: &str = "http://127.0.0.1:9/";

/// Create a CLI command with a temporary data directory
fn cli_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("mediasync").expect("Failed to find mediasync binary");
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd.arg("--server-url").arg(OFFLINE_SERVER);
    cmd
}

// ============================================================================
// Status Command Tests
// ============================================================================

#[test]
fn test_status_on_fresh_data_dir() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checkpoint: all"))
        .stdout(predicate::str::contains("Events: 0 (0 pending)"))
        .stdout(predicate::str::contains("Sounds: 0"));
}

#[test]
fn test_status_shows_server_and_data_directory() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Server: http://127.0.0.1:9/"))
        .stdout(predicate::str::contains("Data directory:"));
}

#[test]
fn test_server_url_from_config_file() {
    let data_dir = TempDir::new().unwrap();
    std::fs::write(
        data_dir.path().join("config.json"),
        r#"{ "server_url": "http://media.example.test/api/" }"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("mediasync").unwrap();
    cmd.arg("--data-dir")
        .arg(data_dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Server: http://media.example.test/api/"));
}

#[test]
fn test_status_creates_database() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir).arg("status").assert().success();

    assert!(data_dir.path().join("mediasync.redb").exists());
}

// ============================================================================
// Events / Catalog Command Tests
// ============================================================================

#[test]
fn test_events_empty() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("events")
        .assert()
        .success()
        .stdout(predicate::str::contains("No events."));
}

#[test]
fn test_events_pending_empty() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["events", "--pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No events."));
}

#[test]
fn test_catalog_empty() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["catalog", "songs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No songs."));
}

#[test]
fn test_catalog_unknown_kind() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["catalog", "videos"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown media kind"));
}

// ============================================================================
// Sync Command Tests
// ============================================================================

#[test]
fn test_sync_without_connectivity_fails() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("sync")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Checkpoint: all"))
        .stderr(predicate::str::contains("no connectivity"));
}

#[test]
fn test_failed_sync_leaves_state_untouched() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir).arg("sync").assert().failure();

    cli_cmd(&data_dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checkpoint: all"))
        .stdout(predicate::str::contains("Events: 0 (0 pending)"));
}

// ============================================================================
// Help Tests
// ============================================================================

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("mediasync").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("catalog"));
}
