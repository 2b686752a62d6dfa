//! Console input parsing.

use opsgate_types::{Capability, Tool};

/// Reason recorded when `elevate` is given none.
pub const DEFAULT_REASON: &str = "requested from console";

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Status,
    Whoami,
    Caps,
    Elevate {
        capability: Capability,
        reason: String,
    },
    Launch(Tool),
    /// Authorization code or the full redirect URL.
    Code(String),
    Retry,
    Logout,
    Help,
    Quit,
    Empty,
    /// Input that is not a command; carries the message to show.
    Invalid(String),
}

impl ConsoleCommand {
    /// Parses one input line. Never fails; bad input becomes [`Self::Invalid`].
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Self::Empty,
            "status" | "s" => Self::Status,
            "whoami" => Self::Whoami,
            "caps" | "capabilities" => Self::Caps,
            "elevate" => Self::parse_elevate(rest),
            "launch" if rest.is_empty() => {
                Self::Invalid(format!("usage: launch <{}>", tool_list()))
            }
            "launch" => match rest.parse::<Tool>() {
                Ok(tool) => Self::Launch(tool),
                Err(_) => Self::Invalid(format!(
                    "unknown tool '{rest}' (expected one of: {})",
                    tool_list()
                )),
            },
            "code" if rest.is_empty() => Self::Invalid("usage: code <authorization-code>".into()),
            "code" => Self::Code(rest.to_string()),
            "retry" => Self::Retry,
            "logout" => Self::Logout,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => Self::Invalid(format!("unknown command '{other}' (type 'help')")),
        }
    }

    fn parse_elevate(rest: &str) -> Self {
        let (cap, reason) = match rest.split_once(char::is_whitespace) {
            Some((c, r)) => (c, r.trim()),
            None => (rest, ""),
        };
        if cap.is_empty() {
            return Self::Invalid("usage: elevate <capability> [reason...]".into());
        }
        match cap.parse::<Capability>() {
            Ok(capability) => Self::Elevate {
                capability,
                reason: if reason.is_empty() {
                    DEFAULT_REASON.to_string()
                } else {
                    reason.to_string()
                },
            },
            Err(e) => Self::Invalid(e.to_string()),
        }
    }
}

fn tool_list() -> String {
    Tool::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join("|")
}
