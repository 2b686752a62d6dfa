//! The authenticated subject.

use crate::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of an authenticated session.
///
/// Taken from the identity provider's session claim when present,
/// otherwise generated locally. Grants are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an id issued by the identity provider.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random local id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated identity and role for the current session.
///
/// Immutable. A role change requires a new authentication and therefore
/// a new `Subject`.
///
/// # Example
///
/// ```
/// use opsgate_types::{Role, SessionId, Subject};
///
/// let subject = Subject::new("u-17", "Jo Operator", Role::Engineer, SessionId::new("s-1"));
/// assert_eq!(subject.role(), Role::Engineer);
/// assert_eq!(subject.session_id().as_str(), "s-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    user_id: String,
    display_name: String,
    role: Role,
    session_id: SessionId,
}

impl Subject {
    /// Creates a subject.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        session_id: SessionId,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            role,
            session_id,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns `true` if `other` is the same user with the same role.
    ///
    /// Used after a token refresh: anything else forces re-authentication.
    #[must_use]
    pub fn same_identity(&self, other: &Subject) -> bool {
        self.user_id == other.user_id && self.role == other.role
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_session_ids_differ() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }

    #[test]
    fn same_identity_ignores_session_and_name() {
        let a = Subject::new("u1", "A", Role::Engineer, SessionId::new("s1"));
        let b = Subject::new("u1", "A. Person", Role::Engineer, SessionId::new("s2"));
        let c = Subject::new("u1", "A", Role::Administrator, SessionId::new("s1"));
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }

    #[test]
    fn display() {
        let s = Subject::new("u1", "Kim", Role::Operator, SessionId::new("s"));
        assert_eq!(s.to_string(), "Kim (operator)");
    }
}
