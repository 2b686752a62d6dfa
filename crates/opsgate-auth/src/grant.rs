//! Time-bounded elevation grants.
//!
//! A [`Grant`] records that one elevatable capability is authorized for
//! one session until `expires_at`. Grants are never extended in place:
//! renewing means inserting a new grant that replaces the old one.
//!
//! # Architecture
//!
//! ```text
//! GrantPolicy trait (opsgate-auth)   ← trait definition (THIS MODULE)
//!          │
//!          └── DefaultGrantStore (opsgate-runtime)   ← in-memory impl
//! ```
//!
//! A grant is valid iff `now < expires_at` AND its session is still
//! active. The first half is checked here, the second through
//! [`SessionLiveness`].

use chrono::{DateTime, Utc};
use opsgate_types::{Capability, ErrorCode, SessionId};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Error returned by grant construction and store access.
#[derive(Debug, Error)]
pub enum GrantError {
    /// `expires_at` is not strictly after `granted_at`.
    #[error("grant window is empty: expires {expires_at} at or before {granted_at}")]
    EmptyWindow {
        granted_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },

    /// The requested duration cannot be represented.
    #[error("grant duration out of range: {0:?}")]
    DurationOutOfRange(Duration),

    /// Internal lock was poisoned (a thread panicked while holding it).
    #[error("grant store lock poisoned: {context}")]
    LockPoisoned {
        /// Which lock was poisoned.
        context: String,
    },
}

impl ErrorCode for GrantError {
    fn code(&self) -> &'static str {
        match self {
            Self::EmptyWindow { .. } => "GRANT_EMPTY_WINDOW",
            Self::DurationOutOfRange(_) => "GRANT_DURATION_OUT_OF_RANGE",
            Self::LockPoisoned { .. } => "GRANT_LOCK_POISONED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Authorization of one capability for one session, until a fixed time.
///
/// # Example
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use opsgate_auth::Grant;
/// use opsgate_types::{Capability, SessionId};
///
/// let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
/// let grant = Grant::new(
///     Capability::EditConfiguration,
///     SessionId::new("s-1"),
///     t0,
///     t0 + Duration::minutes(15),
/// )
/// .unwrap();
///
/// assert!(grant.is_valid_at(t0 + Duration::minutes(14)));
/// assert!(!grant.is_valid_at(t0 + Duration::minutes(15)));
/// ```
/// Serializes for display and audit only; grants are never loaded back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    capability: Capability,
    session_id: SessionId,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Grant {
    /// Creates a grant.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::EmptyWindow`] unless `expires_at > granted_at`.
    pub fn new(
        capability: Capability,
        session_id: SessionId,
        granted_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, GrantError> {
        if expires_at <= granted_at {
            return Err(GrantError::EmptyWindow {
                granted_at,
                expires_at,
            });
        }
        Ok(Self {
            capability,
            session_id,
            granted_at,
            expires_at,
        })
    }

    /// Creates a grant lasting `duration` from `now`.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] for a zero or unrepresentable duration.
    pub fn lasting(
        capability: Capability,
        session_id: SessionId,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Result<Self, GrantError> {
        let delta = chrono::Duration::from_std(duration)
            .map_err(|_| GrantError::DurationOutOfRange(duration))?;
        let expires_at = now
            .checked_add_signed(delta)
            .ok_or(GrantError::DurationOutOfRange(duration))?;
        Self::new(capability, session_id, now, expires_at)
    }

    #[must_use]
    pub fn capability(&self) -> Capability {
        self.capability
    }

    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns `true` if `at` is strictly before expiry.
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at < self.expires_at
    }

    /// Time left at `at`, or `None` once expired.
    #[must_use]
    pub fn remaining_at(&self, at: DateTime<Utc>) -> Option<chrono::Duration> {
        self.is_valid_at(at).then(|| self.expires_at - at)
    }
}

/// Result of looking up a grant without consuming it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStatus {
    /// A grant exists and is valid.
    Active { expires_at: DateTime<Utc> },
    /// A grant exists but its window has lapsed.
    Expired { expired_at: DateTime<Utc> },
    /// No grant for this key.
    Missing,
}

impl GrantStatus {
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Answers whether a session is still active.
///
/// Implemented by the bootstrap state machine; grant stores consult it
/// so that grants die with their session.
pub trait SessionLiveness: Send + Sync {
    fn is_active(&self, session_id: &SessionId) -> bool;
}

/// Storage of elevation grants keyed by `(session, capability)`.
///
/// Implementations must be `Send + Sync` and serialize writes.
///
/// # Example
///
/// ```
/// use opsgate_auth::GrantPolicy;
/// use opsgate_types::{Capability, SessionId};
///
/// fn can_edit(grants: &dyn GrantPolicy, session: &SessionId) -> bool {
///     grants
///         .is_valid(session, Capability::EditConfiguration)
///         .unwrap_or(false)
/// }
/// ```
pub trait GrantPolicy: Send + Sync + std::fmt::Debug {
    /// Stores `grant`, replacing any grant for the same key.
    ///
    /// Returns the replaced grant, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn insert(&self, grant: Grant) -> Result<Option<Grant>, GrantError>;

    /// Checks validity against the current time, evaluated at call time.
    ///
    /// Expired grants may be dropped as a side effect.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn is_valid(&self, session_id: &SessionId, capability: Capability) -> Result<bool, GrantError>;

    /// Reports the grant's status without dropping anything.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn status(
        &self,
        session_id: &SessionId,
        capability: Capability,
    ) -> Result<GrantStatus, GrantError>;

    /// Removes every grant of `session_id`. Returns how many were removed.
    ///
    /// This is the only explicit eviction path.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn clear(&self, session_id: &SessionId) -> Result<usize, GrantError>;

    /// Number of stored grants, expired ones included.
    fn grant_count(&self) -> usize;

    /// Stored grants of `session_id`. Order unspecified.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError`] if internal state is inaccessible.
    fn list_grants(&self, session_id: &SessionId) -> Result<Vec<Grant>, GrantError>;
}
