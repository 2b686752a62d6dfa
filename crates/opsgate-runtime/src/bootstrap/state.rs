//! Bootstrap states and errors.

use opsgate_types::{ErrorCode, Subject};
use std::fmt;
use thiserror::Error;

/// Why bootstrap could not establish a session.
///
/// The machine holds at most one current error; a new one replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    /// The reachability probe failed.
    #[error("provider unreachable")]
    ProviderUnreachable,

    /// The watchdog fired before the attempt concluded.
    #[error("not responding")]
    NotResponding,

    /// The provider failed during session initialization.
    #[error("identity provider error: {0}")]
    Provider(String),

    /// The token could not be turned into a subject.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The access token passed its expiry.
    #[error("session expired")]
    SessionExpired,

    /// Silent refresh failed.
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),

    /// A refreshed token names a different user or role.
    #[error("identity changed during refresh; sign in again")]
    IdentityChanged,

    /// Interactive login could not be completed.
    #[error("login failed: {0}")]
    LoginFailed(String),
}

impl ErrorCode for BootstrapError {
    fn code(&self) -> &'static str {
        match self {
            Self::ProviderUnreachable => "BOOTSTRAP_PROVIDER_UNREACHABLE",
            Self::NotResponding => "BOOTSTRAP_NOT_RESPONDING",
            Self::Provider(_) => "BOOTSTRAP_PROVIDER",
            Self::MalformedToken(_) => "BOOTSTRAP_MALFORMED_TOKEN",
            Self::SessionExpired => "BOOTSTRAP_SESSION_EXPIRED",
            Self::RefreshFailed(_) => "BOOTSTRAP_REFRESH_FAILED",
            Self::IdentityChanged => "BOOTSTRAP_IDENTITY_CHANGED",
            Self::LoginFailed(_) => "BOOTSTRAP_LOGIN_FAILED",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::MalformedToken(_))
    }
}

/// State of the bootstrap machine.
///
/// ```text
/// Idle → Probing → {Unreachable | Initializing}
///                        Initializing → {Redirecting | SessionActive | Unreachable}
///                        SessionActive → Ready
/// Redirecting → (complete_login) → Initializing → {Ready | Failed}
/// Unreachable | Failed → (retry) → Probing
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BootstrapState {
    #[default]
    Idle,
    Probing,
    Initializing,
    Unreachable {
        error: BootstrapError,
    },
    /// Control has left the process: the operator must sign in at `login_url`.
    Redirecting {
        login_url: String,
    },
    SessionActive {
        subject: Subject,
    },
    Ready {
        subject: Subject,
    },
    Failed {
        error: BootstrapError,
    },
}

impl BootstrapState {
    #[must_use]
    pub fn phase(&self) -> BootstrapPhase {
        match self {
            Self::Idle => BootstrapPhase::Idle,
            Self::Probing => BootstrapPhase::Probing,
            Self::Initializing => BootstrapPhase::Initializing,
            Self::Unreachable { .. } => BootstrapPhase::Unreachable,
            Self::Redirecting { .. } => BootstrapPhase::Redirecting,
            Self::SessionActive { .. } => BootstrapPhase::SessionActive,
            Self::Ready { .. } => BootstrapPhase::Ready,
            Self::Failed { .. } => BootstrapPhase::Failed,
        }
    }

    /// Returns `true` when no operation is in flight.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.phase().is_settled()
    }

    #[must_use]
    pub fn error(&self) -> Option<&BootstrapError> {
        match self {
            Self::Unreachable { error } | Self::Failed { error } => Some(error),
            _ => None,
        }
    }

    #[must_use]
    pub fn subject(&self) -> Option<&Subject> {
        match self {
            Self::Ready { subject } | Self::SessionActive { subject } => Some(subject),
            _ => None,
        }
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { error } | Self::Failed { error } => {
                write!(f, "{}: {error}", self.phase())
            }
            Self::Redirecting { login_url } => write!(f, "redirecting: {login_url}"),
            Self::Ready { subject } => write!(f, "ready: {subject}"),
            _ => write!(f, "{}", self.phase()),
        }
    }
}

/// Discriminant of [`BootstrapState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapPhase {
    Idle,
    Probing,
    Initializing,
    Unreachable,
    Redirecting,
    SessionActive,
    Ready,
    Failed,
}

impl BootstrapPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Initializing => "initializing",
            Self::Unreachable => "unreachable",
            Self::Redirecting => "redirecting",
            Self::SessionActive => "session_active",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Unreachable | Self::Redirecting | Self::Ready | Self::Failed
        )
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// Attempt that made the transition.
    pub epoch: u64,
    pub from: BootstrapPhase,
    pub to: BootstrapPhase,
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsgate_types::{Role, SessionId};

    #[test]
    fn settled_phases() {
        let settled: Vec<_> = [
            BootstrapPhase::Idle,
            BootstrapPhase::Probing,
            BootstrapPhase::Initializing,
            BootstrapPhase::Unreachable,
            BootstrapPhase::Redirecting,
            BootstrapPhase::SessionActive,
            BootstrapPhase::Ready,
            BootstrapPhase::Failed,
        ]
        .into_iter()
        .filter(|p| p.is_settled())
        .collect();
        assert_eq!(
            settled,
            vec![
                BootstrapPhase::Idle,
                BootstrapPhase::Unreachable,
                BootstrapPhase::Redirecting,
                BootstrapPhase::Ready,
                BootstrapPhase::Failed,
            ]
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(BootstrapError::ProviderUnreachable.to_string(), "provider unreachable");
        assert_eq!(BootstrapError::NotResponding.to_string(), "not responding");
        assert!(!BootstrapError::MalformedToken("x".into()).is_recoverable());
        assert!(BootstrapError::NotResponding.is_recoverable());
    }

    #[test]
    fn accessors() {
        let subject = Subject::new("u", "U", Role::Operator, SessionId::new("s"));
        let ready = BootstrapState::Ready {
            subject: subject.clone(),
        };
        assert_eq!(ready.subject(), Some(&subject));
        assert_eq!(ready.error(), None);

        let down = BootstrapState::Unreachable {
            error: BootstrapError::ProviderUnreachable,
        };
        assert_eq!(down.error(), Some(&BootstrapError::ProviderUnreachable));
        assert_eq!(down.to_string(), "unreachable: provider unreachable");
    }
}
