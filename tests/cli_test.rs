//! Smoke tests for the kafka-facade binary.

use assert_cmd::Command;
use predicates::prelude::*;

mod common;
use common::temp_config_file;

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("kafka-facade").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("receive"))
        .stdout(predicate::str::contains("send"))
        .stdout(predicate::str::contains("--servers"));
}

#[test]
fn test_version_with_config_file() {
    let (_dir, config_path) = temp_config_file("group_id: g1\nservers: b1:9092\ntopics: t1\n");

    let mut cmd = Command::cargo_bin("kafka-facade").unwrap();
    cmd.arg("--config").arg(config_path).arg("--version");

    cmd.assert().success();
}

#[test]
fn test_send_requires_value() {
    let mut cmd = Command::cargo_bin("kafka-facade").unwrap();
    cmd.arg("send");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--value"));
}

#[test]
fn test_send_without_topics_fails() {
    let (_dir, config_path) = temp_config_file("group_id: g1\nservers: b1:9092\ntopics: \"\"\n");

    let mut cmd = Command::cargo_bin("kafka-facade").unwrap();
    cmd.env_remove("KAFKA_FACADE_TOPICS")
        .arg("--config")
        .arg(config_path)
        .args(["send", "--value", "x"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("topic list is empty"));
}
