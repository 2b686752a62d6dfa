//! Role policy: which capabilities a role holds, may request, or is denied.
//!
//! Every `(role, capability)` pair is classified into exactly one
//! [`Access`] level:
//!
//! ```text
//!                 ┌───────────────┐
//!   (Role, Cap) ─►│  RolePolicy   │─► Unconditional │ Elevatable │ Forbidden
//!                 └───────────────┘
//!                        │
//!                        └─ Elevatable ⇒ each use needs a valid Grant
//! ```
//!
//! [`DefaultRolePolicy`] is an exhaustive `match`, so adding a role or a
//! capability without classifying it fails to compile. Policies loaded
//! at runtime go through [`PolicyTable`](crate::PolicyTable), which checks
//! completeness at construction.

use opsgate_types::{Capability, ErrorCode, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a capability for a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Held whenever the role qualifies. No elevation needed.
    Unconditional,
    /// The role may request it; each use needs a currently valid grant.
    Elevatable,
    /// Never available to the role.
    Forbidden,
}

impl Access {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconditional => "unconditional",
            Self::Elevatable => "elevatable",
            Self::Forbidden => "forbidden",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pure mapping from `(role, capability)` to [`Access`].
///
/// Implementations must be total and side-effect free.
///
/// # Example
///
/// ```
/// use opsgate_auth::{Access, DefaultRolePolicy, RolePolicy};
/// use opsgate_types::{Capability, Role};
///
/// let policy = DefaultRolePolicy;
/// assert!(policy.holds(Role::Operator, Capability::ViewHmi));
/// assert!(policy.may_request(Role::Engineer, Capability::EditConfiguration));
/// assert_eq!(
///     policy.classify(Role::Engineer, Capability::AdminControls),
///     Access::Forbidden,
/// );
/// ```
pub trait RolePolicy: Send + Sync + fmt::Debug {
    /// Classifies `capability` for `role`.
    fn classify(&self, role: Role, capability: Capability) -> Access;

    /// Returns `true` for role-exclusive capabilities.
    ///
    /// Exclusive capabilities are exempt from the monotonicity rule
    /// checked by [`validate_policy`].
    fn is_exclusive(&self, _capability: Capability) -> bool {
        false
    }

    /// Returns `true` if `role` holds `capability` without elevation.
    fn holds(&self, role: Role, capability: Capability) -> bool {
        self.classify(role, capability) == Access::Unconditional
    }

    /// Returns `true` if `role` may request elevation for `capability`.
    fn may_request(&self, role: Role, capability: Capability) -> bool {
        self.classify(role, capability) == Access::Elevatable
    }

    /// Capabilities `role` holds unconditionally.
    fn unconditional_set(&self, role: Role) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|&c| self.holds(role, c))
            .collect()
    }

    /// Capabilities `role` may request elevation for.
    fn elevatable_set(&self, role: Role) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|&c| self.may_request(role, c))
            .collect()
    }
}

/// Built-in plant policy.
///
/// | Capability | Operator | Engineer | Administrator |
/// |---|---|---|---|
/// | `view_hmi` | U | U | U |
/// | `launch_wincc` | U | U | U |
/// | `launch_hminavi` | U | U | U |
/// | `edit_configuration` | F | E | E |
/// | `admin_controls` (exclusive) | F | F | E |
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRolePolicy;

impl RolePolicy for DefaultRolePolicy {
    fn classify(&self, role: Role, capability: Capability) -> Access {
        use Access::{Elevatable, Forbidden, Unconditional};
        use Capability::*;

        match (role, capability) {
            (_, ViewHmi | LaunchWincc | LaunchHmiNavi) => Unconditional,
            (Role::Operator, EditConfiguration) => Forbidden,
            (Role::Engineer | Role::Administrator, EditConfiguration) => Elevatable,
            (Role::Operator | Role::Engineer, AdminControls) => Forbidden,
            (Role::Administrator, AdminControls) => Elevatable,
        }
    }

    fn is_exclusive(&self, capability: Capability) -> bool {
        matches!(capability, Capability::AdminControls)
    }
}

/// Error raised when a policy is incomplete or inconsistent.
///
/// Always a startup-time failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A pair has no classification.
    #[error("policy does not classify {capability} for {role}")]
    Unclassified { role: Role, capability: Capability },

    /// A pair is classified more than once.
    #[error("policy classifies {capability} for {role} more than once")]
    Duplicate { role: Role, capability: Capability },

    /// The table names a role outside the vocabulary.
    #[error("policy names unknown role '{0}'")]
    UnknownRole(String),

    /// A higher rank lost something a lower rank has.
    #[error("{higher} lacks {capability} ({kind}) which lower rank {lower} has")]
    NotMonotone {
        capability: Capability,
        kind: Access,
        lower: Role,
        higher: Role,
    },
}

impl ErrorCode for PolicyError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unclassified { .. } => "POLICY_UNCLASSIFIED",
            Self::Duplicate { .. } => "POLICY_DUPLICATE",
            Self::UnknownRole(_) => "POLICY_UNKNOWN_ROLE",
            Self::NotMonotone { .. } => "POLICY_NOT_MONOTONE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Checks that capability sets only grow with role rank.
///
/// For each pair of adjacent roles, the higher rank's unconditional set
/// must contain the lower rank's unconditional set, and likewise for the
/// elevatable set. Exclusive capabilities are skipped.
///
/// # Errors
///
/// Returns [`PolicyError::NotMonotone`] for the first violation found.
pub fn validate_policy(policy: &dyn RolePolicy) -> Result<(), PolicyError> {
    for pair in Role::ALL.windows(2) {
        let (lower, higher) = (pair[0], pair[1]);
        for capability in Capability::ALL {
            if policy.is_exclusive(capability) {
                continue;
            }
            let low = policy.classify(lower, capability);
            if low == Access::Forbidden {
                continue;
            }
            if policy.classify(higher, capability) != low {
                return Err(PolicyError::NotMonotone {
                    capability,
                    kind: low,
                    lower,
                    higher,
                });
            }
        }
    }
    Ok(())
}
