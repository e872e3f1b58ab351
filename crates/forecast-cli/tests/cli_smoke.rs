//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `forecast` binary: argument parsing,
//! help text, template printing and error handling.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("forecast").unwrap()
}

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("stability"))
        .stdout(predicate::str::contains("features"))
        .stdout(predicate::str::contains("resume"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("forecast"));
}

#[test]
fn run_without_config_prints_template() {
    cmd()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"fs_methods\""))
        .stdout(predicate::str::contains("\"cv_folds\": 10"))
        .stderr(predicate::str::contains("No config file provided"));
}

#[test]
fn template_shows_overrides() {
    cmd()
        .args(["stability", "--data-root", "/data/diabetes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/data/diabetes"));
}

#[test]
fn nonexistent_config_errors() {
    cmd()
        .args(["run", "/nonexistent/config.json"])
        .assert()
        .failure();
}

#[test]
fn run_with_missing_data_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    let json = serde_json::json!({
        "data_root": dir.path().join("missing").to_str().unwrap(),
        "output_root": dir.path().join("out").to_str().unwrap(),
        "fs_methods": ["anova"],
        "classifiers": ["knn"],
        "sampling_timings": ["sampling_before_fs"],
        "samplings": ["raw"],
        "dataset_types": ["genomic"]
    });
    std::fs::write(&config, json.to_string()).unwrap();
    cmd()
        .arg("run")
        .arg(&config)
        .assert()
        .failure();
}
