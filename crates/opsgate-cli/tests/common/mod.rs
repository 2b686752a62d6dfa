//! Shared helpers for `opsgate` binary tests.

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use std::time::Duration;
use tempfile::TempDir;

/// Upper bound for one binary run. Covers the probe timeout.
pub const TIMEOUT: Duration = Duration::from_secs(20);

/// Nothing listens here, so the reachability probe fails fast.
pub const DEAD_IDP: &str = "http://127.0.0.1:9";

const OPSGATE_VARS: &[&str] = &[
    "OPSGATE_DEBUG",
    "OPSGATE_VERBOSE",
    "OPSGATE_IDP_URL",
    "OPSGATE_IDP_REALM",
    "OPSGATE_IDP_CLIENT_ID",
    "OPSGATE_AUTO_APPROVE",
    "OPSGATE_AUTHORITY_URL",
    "OPSGATE_WINCC_PATH",
    "OPSGATE_HMINAVI_PATH",
    "OPSGATE_TOKEN_CACHE",
    "OPSGATE_LOG_LEVEL",
    "RUST_LOG",
];

/// Command for the `opsgate` binary with an empty home and project dir.
///
/// The guard keeps the directory alive for the duration of the test.
pub fn opsgate_cmd() -> (assert_cmd::Command, TempDir) {
    let home = TempDir::new().expect("tempdir");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("opsgate");
    cmd.timeout(TIMEOUT)
        .env("HOME", home.path())
        .current_dir(home.path());
    for var in OPSGATE_VARS {
        cmd.env_remove(var);
    }
    (cmd, home)
}

/// Like [`opsgate_cmd`], with identity flags pointing at [`DEAD_IDP`].
pub fn unreachable_cmd() -> (assert_cmd::Command, TempDir) {
    let (mut cmd, guard) = opsgate_cmd();
    cmd.args([
        "--idp-url",
        DEAD_IDP,
        "--realm",
        "plant",
        "--client-id",
        "operator-console",
    ]);
    (cmd, guard)
}
