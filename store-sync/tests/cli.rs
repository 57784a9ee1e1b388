use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::{tempdir, TempDir};

/// The binary, run from an empty directory (no stray `.env`) with the
/// credential and endpoint variables cleared.
fn store_sync(cwd: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("store-sync").expect("Binary exists");
    cmd.current_dir(cwd.path())
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENAI_BASE_URL");
    cmd
}

#[test]
fn help_lists_the_flags() {
    let cwd = tempdir().unwrap();
    store_sync(&cwd)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--dir")
                .and(predicate::str::contains("--file"))
                .and(predicate::str::contains("--purpose"))
                .and(predicate::str::contains("--api-key")),
        );
}

#[test]
fn an_input_is_required() {
    let cwd = tempdir().unwrap();
    store_sync(&cwd)
        .args(["--api-key", "sk-test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn dir_and_file_are_mutually_exclusive() {
    let cwd = tempdir().unwrap();
    store_sync(&cwd)
        .args(["--dir", ".", "--file", "bundle.jsonl", "--api-key", "sk-test"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_api_key_exits_with_status_one() {
    let cwd = tempdir().unwrap();
    store_sync(&cwd)
        .args(["--dir", "."])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing API key"));
}

#[test]
fn missing_directory_exits_with_status_one() {
    let cwd = tempdir().unwrap();
    store_sync(&cwd)
        .args(["--dir", "does-not-exist", "--api-key", "sk-test"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn missing_bundle_exits_with_status_one() {
    let cwd = tempdir().unwrap();
    store_sync(&cwd)
        .args(["--file", "nope.jsonl"])
        .env("OPENAI_API_KEY", "sk-from-env")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn invalid_config_file_exits_with_status_one() {
    let cwd = tempdir().unwrap();
    let config = cwd.path().join("store-sync.yaml");
    write(&config, "purpose: [unclosed").unwrap();
    store_sync(&cwd)
        .args(["--dir", ".", "--api-key", "sk-test", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config YAML"));
}

#[test]
fn unreachable_service_fails_at_the_listing_step() {
    let cwd = tempdir().unwrap();
    write(cwd.path().join("notes.md"), "hello").unwrap();
    store_sync(&cwd)
        .args(["--dir", ".", "--api-key", "sk-test"])
        .env("OPENAI_BASE_URL", "http://127.0.0.1:9/v1")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to list remote files"));
}
