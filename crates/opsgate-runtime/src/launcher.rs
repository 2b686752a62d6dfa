//! External tool launching.
//!
//! Launching is fire-and-forget: the child gets null stdio and its own
//! process group, so an interrupt at the console prompt does not reach it.
//! A background thread waits on it so no zombie is left behind. Access
//! checks happen before this layer, in
//! [`AccessContext::launch`](crate::context::AccessContext::launch).

use crate::config::ToolsConfig;
use opsgate_types::Tool;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::process::{Child, Command, Stdio};
use std::thread;

/// Outcome of a launch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LaunchResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Starts external tools.
pub trait ToolLauncher: Send + Sync + std::fmt::Debug {
    fn launch(&self, tool: Tool) -> LaunchResult;
}

/// Spawns the configured executable for each tool.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    paths: HashMap<Tool, String>,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes executable paths from the `[tools]` section.
    #[must_use]
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let mut launcher = Self::new();
        if let Some(path) = &tools.wincc {
            launcher = launcher.with_path(Tool::Wincc, path);
        }
        if let Some(path) = &tools.hminavi {
            launcher = launcher.with_path(Tool::HmiNavi, path);
        }
        launcher
    }

    /// Sets the executable for `tool`. Surrounding quotes are stripped.
    #[must_use]
    pub fn with_path(mut self, tool: Tool, path: &str) -> Self {
        let path = strip_quotes(path);
        if path.is_empty() {
            self.paths.remove(&tool);
        } else {
            self.paths.insert(tool, path.to_string());
        }
        self
    }

    #[must_use]
    pub fn path(&self, tool: Tool) -> Option<&str> {
        self.paths.get(&tool).map(String::as_str)
    }
}

impl ToolLauncher for ProcessLauncher {
    fn launch(&self, tool: Tool) -> LaunchResult {
        let Some(path) = self.path(tool) else {
            return LaunchResult::failed(format!("path not configured for {tool}"));
        };

        match spawn_detached(path) {
            Ok(child) => {
                tracing::info!(%tool, pid = child.id(), "tool launched");
                if let Err(e) = reap_in_background(child, tool) {
                    tracing::warn!(%tool, error = %e, "cannot wait on launched tool");
                }
                LaunchResult::ok()
            }
            Err(e) => {
                tracing::warn!(%tool, path, error = %e, "tool launch failed");
                LaunchResult::failed(format!("failed to start {tool}: {e}"))
            }
        }
    }
}

fn spawn_detached(path: &str) -> io::Result<Child> {
    let mut cmd = Command::new(path);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(&mut cmd);
    cmd.spawn()
}

#[cfg(unix)]
fn detach(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn detach(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn detach(_cmd: &mut Command) {}

/// Waits on `child` from a dedicated thread.
fn reap_in_background(mut child: Child, tool: Tool) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("opsgate-{tool}"))
        .spawn(move || match child.wait() {
            Ok(status) => tracing::debug!(%tool, %status, "tool exited"),
            Err(e) => tracing::warn!(%tool, error = %e, "failed to wait on tool"),
        })
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner.trim();
        }
    }
    s
}
