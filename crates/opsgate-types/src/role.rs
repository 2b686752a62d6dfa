//! Operator roles.
//!
//! A [`Role`] is the privilege tier assigned to an authenticated
//! [`Subject`](crate::Subject). Roles are totally ordered by rank:
//!
//! ```text
//! Operator < Engineer < Administrator
//! ```
//!
//! Identity tokens carry role claims as free-form strings. They are never
//! inspected at runtime beyond [`Role::from_claims`], which maps any claim
//! list onto exactly one role.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Privilege tier of a subject.
///
/// The derived `Ord` follows declaration order, so `Operator` is the
/// lowest rank and `Administrator` the highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Plant operator. Views HMI and launches runtime tools.
    Operator,
    /// Controls engineer. May request configuration edits.
    Engineer,
    /// Administrator. May additionally request administrative controls.
    Administrator,
}

impl Role {
    /// Every role, lowest rank first.
    pub const ALL: [Role; 3] = [Role::Operator, Role::Engineer, Role::Administrator];

    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operator => "operator",
            Self::Engineer => "engineer",
            Self::Administrator => "administrator",
        }
    }

    /// Maps a single token claim onto a role.
    ///
    /// Matching ignores case and surrounding whitespace. `"admin"` is
    /// accepted as an alias of `Administrator`. Unknown claims yield `None`.
    #[must_use]
    pub fn from_claim(claim: &str) -> Option<Self> {
        match claim.trim().to_ascii_lowercase().as_str() {
            "operator" => Some(Self::Operator),
            "engineer" => Some(Self::Engineer),
            "admin" | "administrator" => Some(Self::Administrator),
            _ => None,
        }
    }

    /// Resolves a set of token claims to exactly one role.
    ///
    /// Recognized claims are intersected with the role vocabulary and the
    /// highest rank wins. A token without any recognized claim resolves to
    /// [`Role::Operator`], never to an error.
    ///
    /// # Example
    ///
    /// ```
    /// use opsgate_types::Role;
    ///
    /// assert_eq!(Role::from_claims(["offline_access", "Engineer"]), Role::Engineer);
    /// assert_eq!(Role::from_claims(["engineer", " ADMIN "]), Role::Administrator);
    /// assert_eq!(Role::from_claims(Vec::<String>::new()), Role::Operator);
    /// ```
    #[must_use]
    pub fn from_claims<I, S>(claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        claims
            .into_iter()
            .filter_map(|c| Self::from_claim(c.as_ref()))
            .max()
            .unwrap_or(Self::Operator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_claim(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_order() {
        assert!(Role::Operator < Role::Engineer);
        assert!(Role::Engineer < Role::Administrator);
        assert_eq!(Role::ALL.iter().max(), Some(&Role::Administrator));
    }

    #[test]
    fn claim_matching_is_case_insensitive() {
        assert_eq!(Role::from_claim("ENGINEER"), Some(Role::Engineer));
        assert_eq!(Role::from_claim("  operator "), Some(Role::Operator));
        assert_eq!(Role::from_claim("Admin"), Some(Role::Administrator));
        assert_eq!(Role::from_claim("uma_authorization"), None);
    }

    #[test]
    fn highest_rank_wins() {
        let claims = ["operator", "administrator", "engineer"];
        assert_eq!(Role::from_claims(claims), Role::Administrator);
    }

    #[test]
    fn unrecognized_claims_default_to_lowest_rank() {
        let claims = vec!["default-roles-plant".to_string(), "offline_access".to_string()];
        assert_eq!(Role::from_claims(claims), Role::Operator);
    }

    #[test]
    fn parse_and_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn serde_lowercase() {
        let json = serde_json::to_string(&Role::Engineer).unwrap();
        assert_eq!(json, "\"engineer\"");
    }
}
