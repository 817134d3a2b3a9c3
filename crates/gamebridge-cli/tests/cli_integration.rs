//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! They test the "wiring" between the CLI and the core library, and that
//! data survives across invocations through the on-disk store.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Create a CLI command with a temporary data directory and a short debounce
/// window
fn cli_cmd(data_dir: &TempDir) -> Command {
    let config = data_dir.path().join("config.json");
    if !config.exists() {
        std::fs::write(&config, r#"{"debounceWindowMs": 10, "localDelayMs": 1}"#).unwrap();
    }

    let mut cmd = Command::cargo_bin("gamebridge").expect("Failed to find gamebridge binary");
    cmd.arg("--data-dir")
        .arg(data_dir.path())
        .arg("--config")
        .arg(&config);
    cmd
}

/// Same as [`cli_cmd`], as a logged-in player
fn player_cmd(data_dir: &TempDir, id: &str, name: &str) -> Command {
    let mut cmd = cli_cmd(data_dir);
    cmd.args(["--user-id", id, "--display-name", name]);
    cmd
}

// ============================================================================
// Info Command Tests
// ============================================================================

#[test]
fn test_info_command() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("GameBridge"))
        .stdout(predicate::str::contains("Environment: local"))
        .stdout(predicate::str::contains("ID: local-user"))
        .stdout(predicate::str::contains("Logged in: No"))
        .stdout(predicate::str::contains("Container: 800x600"))
        .stdout(predicate::str::contains("Debounce window: 10ms"));
}

#[test]
fn test_info_with_player() {
    let data_dir = TempDir::new().unwrap();

    player_cmd(&data_dir, "ada", "Ada")
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("ID: ada"))
        .stdout(predicate::str::contains("Name: Ada"))
        .stdout(predicate::str::contains("Logged in: Yes"));
}

#[test]
fn test_invalid_config_fails() {
    let data_dir = TempDir::new().unwrap();
    let config = data_dir.path().join("bad.json");
    std::fs::write(&config, "not json").unwrap();

    Command::cargo_bin("gamebridge")
        .unwrap()
        .arg("--data-dir")
        .arg(data_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

// ============================================================================
// Data Command Tests
// ============================================================================

#[test]
fn test_data_roundtrip_across_invocations() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["data", "set", "level", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved: level"));

    cli_cmd(&data_dir)
        .args(["data", "get", "level"])
        .assert()
        .success()
        .stdout(predicate::eq("3\n"));

    cli_cmd(&data_dir)
        .args(["data", "remove", "level"])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .args(["data", "get", "level"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(not set)"));
}

#[test]
fn test_data_clear_keeps_leaderboards() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["data", "set", "coins", "12"])
        .assert()
        .success();
    player_cmd(&data_dir, "ada", "Ada")
        .args(["leaderboard", "submit", "42"])
        .assert()
        .success();

    cli_cmd(&data_dir)
        .args(["data", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared"));

    cli_cmd(&data_dir)
        .args(["data", "get", "coins"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(not set)"));
    cli_cmd(&data_dir)
        .args(["leaderboard", "top"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada 42"));
}

#[test]
fn test_data_get_empty_key_fails() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["data", "get", ""])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_input"));
}

// ============================================================================
// Leaderboard Command Tests
// ============================================================================

#[test]
fn test_submit_requires_login() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["leaderboard", "submit", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not_logged_in"));
}

#[test]
fn test_leaderboard_ranking() {
    let data_dir = TempDir::new().unwrap();

    player_cmd(&data_dir, "bob", "Bob")
        .args(["leaderboard", "submit", "20", "--display", "20.0s", "--key", "speed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rank: 1 (new best)"));

    player_cmd(&data_dir, "ada", "Ada")
        .args(["leaderboard", "submit", "18.5", "--display", "18.5s", "--key", "speed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rank: 2 (new best)"));

    // A worse score keeps the best one
    player_cmd(&data_dir, "ada", "Ada")
        .args(["leaderboard", "submit", "5", "--key", "speed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rank: 2").and(predicate::str::contains("new best").not()));

    player_cmd(&data_dir, "ada", "Ada")
        .args(["leaderboard", "get", "--key", "speed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Leaderboard (2 entries)"))
        .stdout(predicate::str::contains("1. Bob 20.0s"))
        .stdout(predicate::str::contains("2. Ada 18.5s  <- you"))
        .stdout(predicate::str::contains("Your rank: 2"));
}

#[test]
fn test_leaderboard_top_limit() {
    let data_dir = TempDir::new().unwrap();

    for (id, score) in [("a", "3"), ("b", "2"), ("c", "1")] {
        player_cmd(&data_dir, id, id)
            .args(["leaderboard", "submit", score])
            .assert()
            .success();
    }

    cli_cmd(&data_dir)
        .args(["leaderboard", "top", "--limit", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top 2:"))
        .stdout(predicate::str::contains("a 3"))
        .stdout(predicate::str::contains("c 1").not());

    // Limits below 1 still return one entry
    cli_cmd(&data_dir)
        .args(["leaderboard", "top", "--limit", "-3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top 1:"));
}

#[test]
fn test_empty_leaderboard() {
    let data_dir = TempDir::new().unwrap();

    cli_cmd(&data_dir)
        .args(["leaderboard", "get", "--key", "nothing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No entries."));
}

#[test]
fn test_submit_rejects_long_names() {
    let data_dir = TempDir::new().unwrap();
    let long_name = "n".repeat(51);

    player_cmd(&data_dir, "ada", "Ada")
        .args(["leaderboard", "submit", "1", "--name", &long_name])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid_input"));
}
