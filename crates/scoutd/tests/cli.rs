//! Integration tests for the scout CLI commands.
//!
//! Only offline commands are exercised here; nothing in this file reaches the
//! network. Runs in serial since commands share the process environment.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::tempdir;

// Helper function to create a clean command instance
fn scout() -> Command { Command::cargo_bin("scout").unwrap() }

// Helper to get a temporary config path
fn temp_config() -> (tempfile::TempDir, PathBuf) {
  let dir = tempdir().unwrap();
  let config_path = dir.path().join("scout.toml");
  (dir, config_path)
}

#[test]
#[serial]
fn test_init_and_check() {
  let (dir, config_path) = temp_config();

  // Write the default configuration
  scout()
    .arg("init")
    .arg("--config")
    .arg(&config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("Configuration initialized"));

  assert!(config_path.exists());

  // The generated file validates and echoes its settings
  scout()
    .arg("check")
    .arg("--config")
    .arg(&config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("is valid"))
    .stdout(predicate::str::contains("cs.AI"))
    .stdout(predicate::str::contains("10 papers per run"));

  dir.close().unwrap();
}

#[test]
#[serial]
fn test_init_refuses_overwrite_without_force() {
  let (dir, config_path) = temp_config();
  std::fs::write(&config_path, "[research]\nanalysis_budget = 5\n").unwrap();

  scout()
    .arg("init")
    .arg("--config")
    .arg(&config_path)
    .assert()
    .success()
    .stdout(predicate::str::contains("already exists"));

  // The original file is untouched
  let content = std::fs::read_to_string(&config_path).unwrap();
  assert!(content.contains("analysis_budget = 5"));

  // With --force the file is replaced by the defaults
  scout().arg("init").arg("--force").arg("--config").arg(&config_path).assert().success();
  let content = std::fs::read_to_string(&config_path).unwrap();
  assert!(content.contains("analysis_budget = 10"));

  dir.close().unwrap();
}

#[test]
#[serial]
fn test_check_rejects_invalid_config() {
  let (dir, config_path) = temp_config();
  std::fs::write(&config_path, "[research]\nmin_relevance = 5.0\n").unwrap();

  scout()
    .arg("check")
    .arg("--config")
    .arg(&config_path)
    .assert()
    .failure()
    .stdout(predicate::str::contains("is invalid"));

  dir.close().unwrap();
}

#[test]
#[serial]
fn test_check_reports_missing_config() {
  let (dir, config_path) = temp_config();

  scout().arg("check").arg("--config").arg(&config_path).assert().failure();

  dir.close().unwrap();
}

#[test]
#[serial]
fn test_run_requires_a_config() {
  let (dir, config_path) = temp_config();

  scout()
    .arg("run")
    .arg("--dry-run")
    .arg("--config")
    .arg(&config_path)
    .assert()
    .failure();

  dir.close().unwrap();
}

#[test]
fn test_help_lists_subcommands() {
  scout()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("init"))
    .stdout(predicate::str::contains("check"))
    .stdout(predicate::str::contains("run"))
    .stdout(predicate::str::contains("serve"));
}
