//! Elevation broker.
//!
//! Turns an approved elevation request into a stored, time-bounded grant.
//!
//! ```text
//! request_elevation(subject, cap, reason)
//!     │
//!     ├─ session not live ───────────────► Err(InactiveSession)
//!     ├─ policy(role, cap) != Elevatable ─► Err(Unauthorized)   (authority untouched)
//!     │
//!     ├─ authority.decide()  (bounded by approval_timeout)
//!     │     ├─ Approved ─► insert Grant(now + duration) ─► Ok(approved)
//!     │     ├─ Denied ───────────────────────────────────► Ok(denied)   (no mutation)
//!     │     └─ error / timeout ──────────────────────────► Err(..)      (no retry)
//! ```

use super::approval::{ApprovalAuthority, ApprovalDecision, ApprovalError, ElevationRequest};
use chrono::{DateTime, Utc};
use opsgate_auth::{
    Access, AccessDenied, Clock, Grant, GrantError, GrantPolicy, RolePolicy, SessionLiveness,
    SystemClock,
};
use opsgate_types::{Capability, ErrorCode, Subject};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default elevation window.
pub const DEFAULT_GRANT_DURATION: Duration = Duration::from_secs(15 * 60);

/// Default bound on waiting for an approver.
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Result of an elevation request that reached a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationOutcome {
    pub approved: bool,
    /// Set when approved.
    pub expires_at: Option<DateTime<Utc>>,
    /// Approver's reason, when denied.
    pub denial_reason: Option<String>,
}

/// Elevation request that did not reach a decision.
#[derive(Debug, Error)]
pub enum ElevationError {
    /// The subject's session is no longer active.
    #[error("session is not active")]
    InactiveSession,

    /// The role may not request this capability.
    #[error(transparent)]
    Unauthorized(#[from] AccessDenied),

    /// The authority failed to answer.
    #[error(transparent)]
    Authority(#[from] ApprovalError),

    /// No decision within the approval timeout.
    #[error("no approval decision within {0:?}")]
    Timeout(Duration),

    /// The grant could not be stored.
    #[error(transparent)]
    Store(#[from] GrantError),
}

impl ErrorCode for ElevationError {
    fn code(&self) -> &'static str {
        match self {
            Self::InactiveSession => "ELEVATION_INACTIVE_SESSION",
            Self::Unauthorized(e) => e.code(),
            Self::Authority(e) => e.code(),
            Self::Timeout(_) => "ELEVATION_TIMEOUT",
            Self::Store(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::InactiveSession | Self::Timeout(_) => true,
            Self::Unauthorized(e) => e.is_recoverable(),
            Self::Authority(e) => e.is_recoverable(),
            Self::Store(e) => e.is_recoverable(),
        }
    }
}

/// Orchestrates elevation requests against an [`ApprovalAuthority`].
pub struct ElevationBroker {
    policy: Arc<dyn RolePolicy>,
    grants: Arc<dyn GrantPolicy>,
    authority: Arc<dyn ApprovalAuthority>,
    clock: Arc<dyn Clock>,
    duration: Duration,
    approval_timeout: Duration,
    liveness: Option<Arc<dyn SessionLiveness>>,
}

impl std::fmt::Debug for ElevationBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevationBroker")
            .field("policy", &self.policy)
            .field("authority", &self.authority)
            .field("duration", &self.duration)
            .field("approval_timeout", &self.approval_timeout)
            .finish_non_exhaustive()
    }
}

impl ElevationBroker {
    /// Creates a broker with default duration and timeout on the system clock.
    #[must_use]
    pub fn new(
        policy: Arc<dyn RolePolicy>,
        grants: Arc<dyn GrantPolicy>,
        authority: Arc<dyn ApprovalAuthority>,
    ) -> Self {
        Self {
            policy,
            grants,
            authority,
            clock: Arc::new(SystemClock),
            duration: DEFAULT_GRANT_DURATION,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
            liveness: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the elevation window.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets how long to wait for a decision.
    #[must_use]
    pub fn with_approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Requires the subject's session to be live.
    #[must_use]
    pub fn with_liveness(mut self, liveness: Arc<dyn SessionLiveness>) -> Self {
        self.liveness = Some(liveness);
        self
    }

    /// The configured elevation window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Requests a time-limited grant of `capability` for `subject`.
    ///
    /// Denial is a value (`approved == false`), not an error. No retries.
    ///
    /// # Errors
    ///
    /// - [`ElevationError::InactiveSession`] if the session is gone
    /// - [`ElevationError::Unauthorized`] if the role may not request
    ///   `capability`; the authority is not contacted
    /// - [`ElevationError::Authority`] / [`ElevationError::Timeout`] if no
    ///   decision was obtained
    pub async fn request_elevation(
        &self,
        subject: &Subject,
        capability: Capability,
        reason: &str,
    ) -> Result<ElevationOutcome, ElevationError> {
        let session = subject.session_id();
        if let Some(liveness) = &self.liveness {
            if !liveness.is_active(session) {
                return Err(ElevationError::InactiveSession);
            }
        }

        let access = self.policy.classify(subject.role(), capability);
        if access != Access::Elevatable {
            tracing::warn!(
                user = subject.user_id(),
                role = %subject.role(),
                capability = %capability,
                access = %access,
                "elevation refused by policy"
            );
            return Err(AccessDenied::NotElevatable {
                role: subject.role(),
                capability,
            }
            .into());
        }

        let request = ElevationRequest::new(subject, capability, reason, self.clock.now());
        tracing::info!(
            request_id = %request.id,
            user = subject.user_id(),
            capability = %capability,
            reason,
            "elevation requested"
        );

        let decision = tokio::time::timeout(self.approval_timeout, self.authority.decide(&request))
            .await
            .map_err(|_| {
                tracing::warn!(request_id = %request.id, "elevation timed out awaiting approval");
                ElevationError::Timeout(self.approval_timeout)
            })??;

        match decision {
            ApprovalDecision::Approved => {
                let grant =
                    Grant::lasting(capability, session.clone(), self.clock.now(), self.duration)?;
                let expires_at = grant.expires_at();
                self.grants.insert(grant)?;
                tracing::info!(
                    request_id = %request.id,
                    user = subject.user_id(),
                    capability = %capability,
                    %expires_at,
                    "elevation approved"
                );
                Ok(ElevationOutcome {
                    approved: true,
                    expires_at: Some(expires_at),
                    denial_reason: None,
                })
            }
            ApprovalDecision::Denied { reason } => {
                tracing::warn!(
                    request_id = %request.id,
                    user = subject.user_id(),
                    capability = %capability,
                    reason = reason.as_deref().unwrap_or(""),
                    "elevation denied"
                );
                Ok(ElevationOutcome {
                    approved: false,
                    expires_at: None,
                    denial_reason: reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AutoApprove, DefaultGrantStore};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use opsgate_auth::{DefaultRolePolicy, ManualClock};
    use opsgate_types::{Role, SessionId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counting {
        calls: AtomicUsize,
        decision: ApprovalDecision,
    }

    impl Counting {
        fn new(decision: ApprovalDecision) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                decision,
            })
        }
    }

    #[async_trait]
    impl ApprovalAuthority for Counting {
        async fn decide(&self, _: &ElevationRequest) -> Result<ApprovalDecision, ApprovalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.decision.clone())
        }
    }

    #[derive(Debug)]
    struct Silent;

    #[async_trait]
    impl ApprovalAuthority for Silent {
        async fn decide(&self, _: &ElevationRequest) -> Result<ApprovalDecision, ApprovalError> {
            std::future::pending().await
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap()
    }

    fn subject(role: Role) -> Subject {
        Subject::new("u-1", "Sam", role, SessionId::new("s-1"))
    }

    fn broker(authority: Arc<dyn ApprovalAuthority>) -> (ElevationBroker, Arc<DefaultGrantStore>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(DefaultGrantStore::with_clock(clock.clone()));
        let broker = ElevationBroker::new(Arc::new(DefaultRolePolicy), store.clone(), authority)
            .with_clock(clock);
        (broker, store)
    }

    #[tokio::test]
    async fn non_elevatable_never_reaches_authority() {
        let authority = Counting::new(ApprovalDecision::Approved);
        let (broker, store) = broker(authority.clone());

        let cases = [
            (Role::Operator, Capability::EditConfiguration),
            (Role::Operator, Capability::AdminControls),
            (Role::Engineer, Capability::AdminControls),
            (Role::Administrator, Capability::ViewHmi),
        ];
        for (role, cap) in cases {
            let err = broker
                .request_elevation(&subject(role), cap, "need it")
                .await
                .unwrap_err();
            assert!(
                matches!(err, ElevationError::Unauthorized(AccessDenied::NotElevatable { .. })),
                "{role}/{cap}: {err:?}"
            );
        }
        assert_eq!(authority.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.grant_count(), 0);
    }

    #[tokio::test]
    async fn approval_stores_grant_for_fixed_window() {
        let (broker, store) = broker(Arc::new(AutoApprove));
        let s = subject(Role::Engineer);

        let outcome = broker
            .request_elevation(&s, Capability::EditConfiguration, "batch recipe")
            .await
            .unwrap();

        let expected = t0() + chrono::Duration::minutes(15);
        assert!(outcome.approved);
        assert_eq!(outcome.expires_at, Some(expected));
        assert!(store
            .is_valid(s.session_id(), Capability::EditConfiguration)
            .unwrap());
    }

    #[tokio::test]
    async fn denial_is_a_value_and_mutates_nothing() {
        let authority = Counting::new(ApprovalDecision::Denied {
            reason: Some("no ticket".into()),
        });
        let (broker, store) = broker(authority.clone());

        let outcome = broker
            .request_elevation(&subject(Role::Administrator), Capability::AdminControls, "")
            .await
            .unwrap();

        assert!(!outcome.approved);
        assert_eq!(outcome.expires_at, None);
        assert_eq!(outcome.denial_reason.as_deref(), Some("no ticket"));
        assert_eq!(authority.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.grant_count(), 0);
    }

    #[tokio::test]
    async fn renewal_replaces_previous_grant() {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(DefaultGrantStore::with_clock(clock.clone()));
        let broker = ElevationBroker::new(
            Arc::new(DefaultRolePolicy),
            store.clone(),
            Arc::new(AutoApprove),
        )
        .with_clock(clock.clone());
        let s = subject(Role::Engineer);

        broker
            .request_elevation(&s, Capability::EditConfiguration, "first")
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(10));
        let second = broker
            .request_elevation(&s, Capability::EditConfiguration, "second")
            .await
            .unwrap();

        let grants = store.list_grants(s.session_id()).unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(Some(grants[0].expires_at()), second.expires_at);
        assert_eq!(
            second.expires_at,
            Some(t0() + chrono::Duration::minutes(25))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_authority_times_out_without_mutation() {
        let (broker, store) = broker(Arc::new(Silent));
        let broker = broker.with_approval_timeout(Duration::from_secs(30));

        let err = broker
            .request_elevation(&subject(Role::Engineer), Capability::EditConfiguration, "x")
            .await
            .unwrap_err();

        assert!(matches!(err, ElevationError::Timeout(d) if d == Duration::from_secs(30)));
        assert_eq!(store.grant_count(), 0);
    }

    struct Dead;

    impl SessionLiveness for Dead {
        fn is_active(&self, _: &SessionId) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn inactive_session_is_rejected() {
        let authority = Counting::new(ApprovalDecision::Approved);
        let (broker, _store) = broker(authority.clone());
        let broker = broker.with_liveness(Arc::new(Dead));

        let err = broker
            .request_elevation(&subject(Role::Engineer), Capability::EditConfiguration, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ElevationError::InactiveSession));
        assert_eq!(authority.calls.load(Ordering::SeqCst), 0);
    }
}
