//! CLI black-box tests.

use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("qvm-sanitize").unwrap()
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_requires_at_least_one_file() {
    cmd().assert().failure();
}

#[test]
fn test_rejects_in_place_and_archive_together() {
    cmd()
        .arg("--in-place")
        .arg("--archive")
        .arg("/tmp/does-not-matter")
        .arg("some-file.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_missing_file_fails() {
    cmd()
        .arg("/nonexistent/path/to/a/file.pdf")
        .assert()
        .failure();
}

#[test]
fn test_batch_requires_integer_value() {
    cmd()
        .arg("--batch")
        .arg("not-a-number")
        .arg("some-file.pdf")
        .assert()
        .failure();
}
