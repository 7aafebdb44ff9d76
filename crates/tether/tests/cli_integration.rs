//! CLI integration tests for the Tether command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Configuration is validated before anything is built
//! - The policy and demo commands produce the expected output
//!
//! Every test points `TETHER_CONFIG_DIR` at a temporary directory so that
//! neither the user's config nor their log directory is touched.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the tether binary, isolated in `dir`.
fn tether(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("tether").unwrap();
    cmd.env("TETHER_CONFIG_DIR", dir.path())
        .env_remove("TETHER_CONFIG")
        .current_dir(dir.path());
    cmd
}

fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

const REPLICATED: &str = r#"
[session]
primary_storage = "KeyValue"
secondary_storage_enabled = true
secondary_storage = "Relational"

[session.max_age]
minutes = 30

[stores.relational]
path = ":memory:"
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    tether(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("ttl"))
        .stdout(predicate::str::contains("demo"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    tether(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tether"));
}

#[test]
fn test_no_subcommand_fails() {
    let dir = TempDir::new().unwrap();
    tether(&dir).assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Validate
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_validate_explicit_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, REPLICATED);
    tether(&dir)
        .args(["--json", "validate", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""primary": "KeyValue""#))
        .stdout(predicate::str::contains(r#""secondary": "Relational""#))
        .stdout(predicate::str::contains(r#""store_timeout_ms": 5000"#));
}

#[test]
fn test_validate_discovers_project_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("tether.toml"),
        "[session]\nprimary_storage = \"RDBMS\"\n",
    )
    .unwrap();
    tether(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Relational"))
        .stdout(predicate::str::contains("disabled"));
}

#[test]
fn test_validate_rejects_missing_primary() {
    let dir = TempDir::new().unwrap();
    tether(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("primary_storage"));
}

#[test]
fn test_validate_rejects_secondary_equal_to_primary() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
primary_storage = "Document"
secondary_storage_enabled = true
secondary_storage = "Document"
"#,
    );
    tether(&dir)
        .arg("validate")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("contradictory"));
}

#[test]
fn test_validate_rejects_enabled_secondary_without_kind() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
primary_storage = "KeyValue"
secondary_storage_enabled = true
"#,
    );
    tether(&dir)
        .arg("validate")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("secondary_storage"));
}

#[test]
fn test_validate_rejects_oversized_max_age() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
primary_storage = "KeyValue"

[session.max_age]
minutes = 9223372036854775807
"#,
    );
    tether(&dir)
        .arg("validate")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("session.max_age.minutes"));

    tether(&dir)
        .args(["ttl", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("session.max_age.minutes"));
}

// ─────────────────────────────────────────────────────────────────────────────
// TTL
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_ttl_health_check_is_short() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, REPLICATED);
    tether(&dir)
        .args(["--json", "ttl", "--param", "requestType=healthCheck", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""synthetic": true"#))
        .stdout(predicate::str::contains(r#""max_inactive_interval_secs": 600"#));
}

#[test]
fn test_ttl_referer_marks_synthetic() {
    let dir = TempDir::new().unwrap();
    tether(&dir)
        .args(["ttl", "--referer", "https://x/y?trafficType=testScript"])
        .assert()
        .success()
        .stdout(predicate::str::contains("synthetic"))
        .stdout(predicate::str::contains("600s"));
}

#[test]
fn test_ttl_user_traffic_uses_configured_minutes() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, REPLICATED);
    tether(&dir)
        .args(["ttl", "--cart-minutes", "15", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("max inactive interval: 1800s"))
        .stdout(predicate::str::contains("cart preservation: 900s"));
}

#[test]
fn test_ttl_rejects_bad_minutes() {
    let dir = TempDir::new().unwrap();
    tether(&dir)
        .args(["ttl", "--cart-minutes", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("soon"));
}

#[test]
fn test_ttl_rejects_malformed_param() {
    let dir = TempDir::new().unwrap();
    tether(&dir)
        .args(["ttl", "--param", "requestType"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("key=value"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Demo
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_demo_replicates_to_secondary() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, REPLICATED);
    let output = tether(&dir)
        .args(["demo", "--attr", "user=alice", "--attr", "count=3", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["primary"]["store"], "KeyValue");
    assert_eq!(json["primary"]["attributes"]["user"], "alice");
    assert_eq!(json["primary"]["attributes"]["count"], 3);
    assert_eq!(json["primary"]["max_inactive_interval_secs"], 1800);
    assert_eq!(json["replica"]["store"], "Relational");
    assert_eq!(json["replica"]["attributes"]["user"], "alice");
}

#[test]
fn test_demo_primary_only_with_sqlite_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[session]
primary_storage = "Relational"

[stores.relational]
path = "data/sessions.db"
"#,
    );
    let output = tether(&dir)
        .args(["demo", "--param", "trafficType=internalEmployee", "--delete", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["primary"]["store"], "Relational");
    assert_eq!(json["primary"]["max_inactive_interval_secs"], 600);
    assert!(json["replica"].is_null());
    assert_eq!(json["deleted"], true);
    assert!(dir.path().join("data/sessions.db").exists());
}
