//! End-to-end CLI tests for the harvester binary.

#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Builds a command isolated in `dir` with a settings path that does not exist.
fn harvester_in(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.path().join("missing-settings.toml"))
        .arg("--db")
        .arg(dir.path().join("data").join("papers.db"));
    cmd
}

// ==================== Help and Version ====================

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Collect, categorize"))
        .stdout(predicate::str::contains("import-list"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("harvester"));
}

/// Test that running without a subcommand prints help and fails.
#[test]
fn test_binary_without_subcommand_shows_help() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that out-of-range option values are rejected before any work happens.
#[test]
fn test_binary_rejects_out_of_range_export_limit() {
    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.args(["export", "--limit", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("limit"));
}

// ==================== Local Commands ====================

/// Test that `papers` on a fresh database reports an empty store.
#[test]
fn test_papers_on_empty_database() {
    let dir = TempDir::new().unwrap();
    harvester_in(&dir)
        .arg("papers")
        .assert()
        .success()
        .stdout(predicate::str::contains("No papers stored yet."));
    assert!(dir.path().join("data").join("papers.db").exists());
}

/// Test that `export` with nothing pending writes no batch file.
#[test]
fn test_export_on_empty_database_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let export_dir = dir.path().join("translations");
    harvester_in(&dir)
        .arg("export")
        .arg("--export-dir")
        .arg(&export_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No papers with status 'pending'"));
    assert!(!export_dir.exists());
}

/// Test that `import-list` on a missing directory succeeds with a notice.
#[test]
fn test_import_list_missing_directory() {
    let dir = TempDir::new().unwrap();
    harvester_in(&dir)
        .arg("import-list")
        .arg("--dir")
        .arg(dir.path().join("nowhere"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No CSV files found"));
}

/// Test that `import` with a missing required column fails with a message.
#[test]
fn test_import_rejects_file_without_required_columns() {
    let dir = TempDir::new().unwrap();
    let csv_path = dir.path().join("translation_batch_20240101_000000.csv");
    std::fs::write(&csv_path, "paper_id,abstract_korean\n1,text\n").unwrap();

    harvester_in(&dir)
        .arg("import")
        .arg(&csv_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("translation_status"));
    assert!(csv_path.exists());
}

/// Test that `report` on an empty store still writes a report file.
#[test]
fn test_report_on_empty_database_writes_file() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("settings.toml");
    let output_dir = dir.path().join("out");
    std::fs::write(
        &settings,
        format!("output_dir = \"{}\"\n", output_dir.display()),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&settings)
        .arg("--db")
        .arg(dir.path().join("papers.db"))
        .arg("report")
        .assert()
        .success()
        .stdout(predicate::str::contains("Trend report saved"));

    let written: Vec<_> = std::fs::read_dir(&output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].starts_with("trend_report_"));
}

/// Test that an invalid settings file aborts with a non-zero exit.
#[test]
fn test_invalid_settings_file_returns_error() {
    let dir = TempDir::new().unwrap();
    let settings = dir.path().join("settings.toml");
    std::fs::write(&settings, "max_results = 0\n").unwrap();

    let mut cmd = Command::cargo_bin("harvester").unwrap();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(&settings)
        .arg("papers")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
