//! Default implementation of [`GrantPolicy`].
//!
//! Provides [`DefaultGrantStore`], a thread-safe, in-memory store of
//! elevation grants.
//!
//! # Architecture
//!
//! ```text
//! GrantPolicy trait (opsgate-auth)       ← abstract definition
//!          │
//!          └── DefaultGrantStore (THIS MODULE)  ← concrete impl
//! ```
//!
//! # Expiry
//!
//! Nothing ever sweeps the map. Validity is computed from the clock on
//! every lookup, and an expired grant found by [`GrantPolicy::is_valid`]
//! is dropped on the spot. [`GrantPolicy::clear`] is the only explicit
//! eviction.

use opsgate_auth::{Clock, Grant, GrantError, GrantPolicy, GrantStatus, SessionLiveness, SystemClock};
use opsgate_types::{Capability, SessionId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

type Key = (SessionId, Capability);

/// Thread-safe, in-memory grant store.
///
/// One `RwLock` guards the whole map, so writes for any key are
/// serialized. Grants never outlive the process.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use opsgate_auth::{Grant, GrantPolicy, ManualClock};
/// use opsgate_runtime::DefaultGrantStore;
/// use opsgate_types::{Capability, SessionId};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
/// let clock = Arc::new(ManualClock::new(t0));
/// let store = DefaultGrantStore::with_clock(clock.clone());
/// let session = SessionId::new("s-1");
///
/// let grant = Grant::lasting(
///     Capability::EditConfiguration,
///     session.clone(),
///     t0,
///     Duration::from_secs(900),
/// )
/// .unwrap();
/// store.insert(grant).unwrap();
/// assert!(store.is_valid(&session, Capability::EditConfiguration).unwrap());
///
/// clock.advance(chrono::Duration::minutes(15));
/// assert!(!store.is_valid(&session, Capability::EditConfiguration).unwrap());
/// ```
pub struct DefaultGrantStore {
    grants: RwLock<HashMap<Key, Grant>>,
    clock: Arc<dyn Clock>,
    liveness: Option<Arc<dyn SessionLiveness>>,
}

impl DefaultGrantStore {
    /// Creates an empty store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store on the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            grants: RwLock::new(HashMap::new()),
            clock,
            liveness: None,
        }
    }

    /// Ties grant validity to session liveness.
    ///
    /// Without it, only expiry is checked.
    #[must_use]
    pub fn with_liveness(mut self, liveness: Arc<dyn SessionLiveness>) -> Self {
        self.liveness = Some(liveness);
        self
    }

    fn session_active(&self, session_id: &SessionId) -> bool {
        self.liveness
            .as_ref()
            .map_or(true, |l| l.is_active(session_id))
    }

    fn poisoned(op: &str) -> GrantError {
        tracing::error!("grant_store: lock poisoned on {op}");
        GrantError::LockPoisoned {
            context: format!("grants ({op})"),
        }
    }
}

impl Default for DefaultGrantStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultGrantStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultGrantStore")
            .field("grant_count", &self.grant_count())
            .field("clock", &self.clock)
            .field("liveness", &self.liveness.is_some())
            .finish()
    }
}

impl GrantPolicy for DefaultGrantStore {
    fn insert(&self, grant: Grant) -> Result<Option<Grant>, GrantError> {
        let key = (grant.session_id().clone(), grant.capability());
        let mut map = self.grants.write().map_err(|_| Self::poisoned("insert"))?;
        tracing::debug!(
            session = %grant.session_id(),
            capability = %grant.capability(),
            expires_at = %grant.expires_at(),
            "grant stored"
        );
        Ok(map.insert(key, grant))
    }

    fn is_valid(&self, session_id: &SessionId, capability: Capability) -> Result<bool, GrantError> {
        if !self.session_active(session_id) {
            return Ok(false);
        }
        let now = self.clock.now();
        let key = (session_id.clone(), capability);
        {
            let map = self.grants.read().map_err(|_| Self::poisoned("is_valid"))?;
            match map.get(&key) {
                None => return Ok(false),
                Some(g) if g.is_valid_at(now) => return Ok(true),
                Some(_) => {}
            }
        }

        // Expired: drop it unless a fresh grant replaced it meanwhile.
        let mut map = self.grants.write().map_err(|_| Self::poisoned("is_valid"))?;
        if map.get(&key).is_some_and(|g| !g.is_valid_at(now)) {
            map.remove(&key);
            tracing::debug!(session = %session_id, capability = %capability, "expired grant dropped");
        }
        Ok(false)
    }

    fn status(
        &self,
        session_id: &SessionId,
        capability: Capability,
    ) -> Result<GrantStatus, GrantError> {
        let now = self.clock.now();
        let map = self.grants.read().map_err(|_| Self::poisoned("status"))?;
        let Some(grant) = map.get(&(session_id.clone(), capability)) else {
            return Ok(GrantStatus::Missing);
        };
        if grant.is_valid_at(now) && self.session_active(session_id) {
            Ok(GrantStatus::Active {
                expires_at: grant.expires_at(),
            })
        } else {
            Ok(GrantStatus::Expired {
                expired_at: grant.expires_at().min(now),
            })
        }
    }

    fn clear(&self, session_id: &SessionId) -> Result<usize, GrantError> {
        let mut map = self.grants.write().map_err(|_| Self::poisoned("clear"))?;
        let before = map.len();
        map.retain(|(sid, _), _| sid != session_id);
        let removed = before - map.len();
        tracing::debug!(session = %session_id, removed, "grants cleared");
        Ok(removed)
    }

    fn grant_count(&self) -> usize {
        self.grants.read().map(|m| m.len()).unwrap_or(0)
    }

    fn list_grants(&self, session_id: &SessionId) -> Result<Vec<Grant>, GrantError> {
        let map = self.grants.read().map_err(|_| Self::poisoned("list_grants"))?;
        Ok(map
            .values()
            .filter(|g| g.session_id() == session_id)
            .cloned()
            .collect())
    }
}
