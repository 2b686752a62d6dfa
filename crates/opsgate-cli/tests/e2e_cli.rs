//! E2E tests for the `opsgate` binary.
//!
//! Console output and tracing go to stdout; startup errors go to stderr.

mod common;

use common::{opsgate_cmd, unreachable_cmd};
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

#[test]
fn help_lists_identity_flags() {
    let (mut cmd, _guard) = opsgate_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("--idp-url"))
        .stdout(contains("--client-id"));
}

#[test]
fn missing_identity_is_a_configuration_error() {
    let (mut cmd, _guard) = opsgate_cmd();
    cmd.arg("status")
        .assert()
        .failure()
        .stderr(contains("Configuration error"))
        .stderr(contains("identity.url"));
}

#[test]
fn broken_project_config_is_reported() {
    let (mut cmd, guard) = unreachable_cmd();
    let dir = guard.path().join(".opsgate");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "[identity\nurl = ").unwrap();

    cmd.arg("status")
        .assert()
        .failure()
        .stderr(contains("Configuration error"));
}

#[test]
fn status_reports_unreachable_provider() {
    let (mut cmd, _guard) = unreachable_cmd();
    cmd.arg("status")
        .assert()
        .success()
        .stdout(contains("Session: unreachable (provider unreachable)"));
}

#[test]
fn command_needing_a_session_fails() {
    let (mut cmd, _guard) = unreachable_cmd();
    cmd.arg("whoami")
        .assert()
        .code(1)
        .stdout(contains("Error: no active session"));
}

#[test]
fn interactive_exits_on_empty_stdin() {
    let (mut cmd, _guard) = unreachable_cmd();
    cmd.write_stdin("")
        .assert()
        .success()
        .stdout(contains("opsgate console"))
        .stdout(contains("provider unreachable"))
        .stdout(contains("Shutting down"));
}

#[test]
fn interactive_commands_run_in_order() {
    let (mut cmd, _guard) = unreachable_cmd();
    cmd.write_stdin("help\ncaps\nq\n")
        .assert()
        .success()
        .stdout(contains("Commands:"))
        .stdout(contains("Error: no active session"))
        .stdout(contains("quit requested").or(contains("Shutting down")));
}
