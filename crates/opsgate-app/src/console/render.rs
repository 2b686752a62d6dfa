//! Text rendering for console replies.

use chrono::{DateTime, Utc};
use opsgate_auth::Access;
use opsgate_runtime::{BootstrapState, CapabilityView, ElevationOutcome, LaunchResult};
use opsgate_types::{Capability, Subject, Tool};

fn clock_time(at: DateTime<Utc>) -> String {
    at.format("%H:%M:%S UTC").to_string()
}

/// One-paragraph description of the session state with the next step.
#[must_use]
pub fn describe_state(state: &BootstrapState) -> String {
    match state {
        BootstrapState::Idle => "Session: signed out. Type 'retry' to sign in.".into(),
        BootstrapState::Probing | BootstrapState::Initializing => {
            format!("Session: connecting ({})", state.phase())
        }
        BootstrapState::Unreachable { error } => {
            format!("Session: unreachable ({error}). Type 'retry' to try again.")
        }
        BootstrapState::Redirecting { login_url } => format!(
            "Sign in at:\n  {login_url}\nthen enter: code <authorization-code or redirect URL>"
        ),
        BootstrapState::SessionActive { subject } => {
            format!("Session: active for {subject}")
        }
        BootstrapState::Ready { subject } => format!("Signed in as {subject}"),
        BootstrapState::Failed { error } => {
            format!("Session: failed ({error}). Type 'retry' to start over.")
        }
    }
}

#[must_use]
pub fn whoami(subject: &Subject) -> String {
    format!(
        "{}\n  user:    {}\n  role:    {}\n  session: {}",
        subject.display_name(),
        subject.user_id(),
        subject.role(),
        subject.session_id().as_str()
    )
}

fn cap_status(view: &CapabilityView) -> String {
    match (view.access, view.granted_until) {
        (Access::Unconditional, _) => "available".into(),
        (Access::Elevatable, Some(until)) if view.usable => {
            format!("granted until {}", clock_time(until))
        }
        (Access::Elevatable, _) => "elevation required".into(),
        (Access::Forbidden, _) => "-".into(),
    }
}

/// Capability overview as an aligned table.
#[must_use]
pub fn capabilities(views: &[CapabilityView]) -> String {
    let mut out = format!("{:<20} {:<13} {}", "CAPABILITY", "ACCESS", "STATUS");
    for view in views {
        out.push('\n');
        out.push_str(&format!(
            "{:<20} {:<13} {}",
            view.capability.as_str(),
            view.access.as_str(),
            cap_status(view)
        ));
    }
    out
}

#[must_use]
pub fn elevation(capability: Capability, outcome: &ElevationOutcome) -> String {
    match (outcome.approved, outcome.expires_at) {
        (true, Some(until)) => {
            format!("Elevation approved: {capability} until {}", clock_time(until))
        }
        (true, None) => format!("Elevation approved: {capability}"),
        (false, _) => match outcome.denial_reason.as_deref() {
            Some(reason) if !reason.is_empty() => {
                format!("Elevation denied: {capability} ({reason})")
            }
            _ => format!("Elevation denied: {capability}"),
        },
    }
}

#[must_use]
pub fn launch(tool: Tool, result: &LaunchResult) -> String {
    match &result.error {
        None if result.ok => format!("Started {}", tool.as_str()),
        Some(e) => format!("Launch failed: {e}"),
        None => format!("Launch failed: {}", tool.as_str()),
    }
}

pub const HELP: &str = "Commands:\n\
    \x20 status                          - Show session state\n\
    \x20 whoami                          - Show the signed-in user\n\
    \x20 caps                            - List capabilities and grants\n\
    \x20 elevate <capability> [reason]   - Request temporary elevation\n\
    \x20 launch <wincc|hminavi>          - Start a tool\n\
    \x20 code <code or redirect URL>     - Finish signing in\n\
    \x20 retry                           - Retry after a failure\n\
    \x20 logout                          - End the session\n\
    \x20 q / quit                        - Quit";
