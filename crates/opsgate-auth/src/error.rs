//! Access denied error type.
//!
//! [`AccessDenied`] separates the reasons an action is refused:
//!
//! ```text
//!   RolePolicy says Forbidden ───────────► Forbidden / NotElevatable   (policy)
//!   Elevatable, no grant ───────────────► ElevationRequired            (grant)
//!   Elevatable, grant lapsed ────────────► GrantExpired                 (grant)
//!   No authenticated subject ────────────► NoSession                    (session)
//! ```
//!
//! Policy denials are final. Grant denials re-enter the elevation flow.

use chrono::{DateTime, Utc};
use opsgate_types::{Capability, ErrorCode, Role};
use thiserror::Error;

/// Why an action was refused.
///
/// # Example
///
/// ```
/// use opsgate_auth::AccessDenied;
/// use opsgate_types::{Capability, ErrorCode, Role};
///
/// let err = AccessDenied::Forbidden {
///     role: Role::Operator,
///     capability: Capability::AdminControls,
/// };
/// assert_eq!(err.layer(), "policy");
/// assert_eq!(err.code(), "AUTH_FORBIDDEN");
/// assert!(!err.requires_elevation());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// The role may never use this capability.
    #[error("{role} is not permitted to use {capability}")]
    Forbidden { role: Role, capability: Capability },

    /// Elevation was requested for a capability outside the role's elevatable set.
    #[error("{role} may not request elevation for {capability}")]
    NotElevatable { role: Role, capability: Capability },

    /// The capability needs an approved elevation and none exists.
    #[error("{capability} requires an approved elevation")]
    ElevationRequired { capability: Capability },

    /// The elevation window lapsed.
    #[error("elevation for {capability} expired at {expired_at}")]
    GrantExpired {
        capability: Capability,
        expired_at: DateTime<Utc>,
    },

    /// No authenticated subject.
    #[error("no active session")]
    NoSession,
}

impl AccessDenied {
    /// Returns the layer that refused access.
    #[must_use]
    pub fn layer(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } | Self::NotElevatable { .. } => "policy",
            Self::ElevationRequired { .. } | Self::GrantExpired { .. } => "grant",
            Self::NoSession => "session",
        }
    }

    /// Returns `true` if the caller should offer an elevation request.
    #[must_use]
    pub fn requires_elevation(&self) -> bool {
        matches!(
            self,
            Self::ElevationRequired { .. } | Self::GrantExpired { .. }
        )
    }
}

impl ErrorCode for AccessDenied {
    fn code(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "AUTH_FORBIDDEN",
            Self::NotElevatable { .. } => "AUTH_NOT_ELEVATABLE",
            Self::ElevationRequired { .. } => "AUTH_ELEVATION_REQUIRED",
            Self::GrantExpired { .. } => "AUTH_GRANT_EXPIRED",
            Self::NoSession => "AUTH_NO_SESSION",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Forbidden { .. } | Self::NotElevatable { .. } => false,
            Self::ElevationRequired { .. } | Self::GrantExpired { .. } | Self::NoSession => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn policy_denials_are_final() {
        let err = AccessDenied::NotElevatable {
            role: Role::Engineer,
            capability: Capability::AdminControls,
        };
        assert_eq!(err.layer(), "policy");
        assert!(!err.is_recoverable());
        assert!(!err.requires_elevation());
        let msg = err.to_string();
        assert!(msg.contains("engineer"), "got: {msg}");
        assert!(msg.contains("admin_controls"), "got: {msg}");
    }

    #[test]
    fn expired_grant_is_distinct_from_denial() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 15, 0).unwrap();
        let err = AccessDenied::GrantExpired {
            capability: Capability::EditConfiguration,
            expired_at: at,
        };
        assert_eq!(err.code(), "AUTH_GRANT_EXPIRED");
        assert_eq!(err.layer(), "grant");
        assert!(err.requires_elevation());
        assert!(err.is_recoverable());
    }

    #[test]
    fn no_session() {
        let err = AccessDenied::NoSession;
        assert_eq!(err.layer(), "session");
        assert_eq!(err.to_string(), "no active session");
    }
}
