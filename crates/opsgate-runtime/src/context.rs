//! The access gate.
//!
//! [`AccessContext`] owns one operator session: the bootstrap machine,
//! the role policy, the grant store, the elevation broker and the tool
//! launcher. Everything the console does goes through it.
//!
//! ```text
//! check(capability)
//!     │
//!     ├─ no Ready subject ───────────► Err(NoSession)
//!     ├─ Unconditional ──────────────► Ok
//!     ├─ Forbidden ──────────────────► Err(Forbidden)
//!     └─ Elevatable
//!           ├─ active grant ─────────► Ok
//!           ├─ expired grant ────────► Err(GrantExpired)   (until replaced or cleared)
//!           └─ none ─────────────────► Err(ElevationRequired)
//! ```

use crate::auth::{
    ApprovalAuthority, AutoApprove, DefaultGrantStore, ElevationBroker, ElevationError,
    ElevationOutcome, HttpApprovalAuthority, NoAuthority, DEFAULT_APPROVAL_TIMEOUT,
    DEFAULT_GRANT_DURATION,
};
use crate::bootstrap::{AuthBootstrap, BootstrapState};
use crate::config::{ConfigError, OpsConfig};
use crate::identity::{HttpReachabilityProbe, KeycloakProvider, TokenCache};
use crate::launcher::{LaunchResult, ProcessLauncher, ToolLauncher};
use chrono::{DateTime, Utc};
use opsgate_auth::{
    Access, AccessDenied, Clock, DefaultRolePolicy, GrantPolicy, GrantStatus, RolePolicy,
    SystemClock,
};
use opsgate_types::{Capability, SessionId, Subject, Tool};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// One row of the capability overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityView {
    pub capability: Capability,
    pub label: &'static str,
    pub access: Access,
    /// Expiry of the active grant, for elevatable capabilities.
    pub granted_until: Option<DateTime<Utc>>,
    /// Whether [`AccessContext::check`] would pass right now.
    pub usable: bool,
}

/// Builds an [`AccessContext`] around a bootstrap machine.
pub struct AccessContextBuilder {
    bootstrap: AuthBootstrap,
    policy: Arc<dyn RolePolicy>,
    authority: Arc<dyn ApprovalAuthority>,
    launcher: Arc<dyn ToolLauncher>,
    clock: Arc<dyn Clock>,
    grant_duration: Duration,
    approval_timeout: Duration,
}

impl AccessContextBuilder {
    #[must_use]
    pub fn policy(mut self, policy: Arc<dyn RolePolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn authority(mut self, authority: Arc<dyn ApprovalAuthority>) -> Self {
        self.authority = authority;
        self
    }

    #[must_use]
    pub fn launcher(mut self, launcher: Arc<dyn ToolLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Clock for grant timestamps and expiry.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn grant_duration(mut self, duration: Duration) -> Self {
        self.grant_duration = duration;
        self
    }

    #[must_use]
    pub fn approval_timeout(mut self, timeout: Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    #[must_use]
    pub fn build(self) -> AccessContext {
        let liveness = Arc::new(self.bootstrap.clone());
        let grants: Arc<dyn GrantPolicy> = Arc::new(
            DefaultGrantStore::with_clock(Arc::clone(&self.clock)).with_liveness(liveness.clone()),
        );
        let broker = ElevationBroker::new(
            Arc::clone(&self.policy),
            Arc::clone(&grants),
            self.authority,
        )
        .with_clock(self.clock)
        .with_duration(self.grant_duration)
        .with_approval_timeout(self.approval_timeout)
        .with_liveness(liveness);

        AccessContext {
            bootstrap: self.bootstrap,
            policy: self.policy,
            grants,
            broker,
            launcher: self.launcher,
        }
    }
}

/// An operator session and everything gated by it.
///
/// Owned explicitly; two contexts never share state.
#[derive(Debug)]
pub struct AccessContext {
    bootstrap: AuthBootstrap,
    policy: Arc<dyn RolePolicy>,
    grants: Arc<dyn GrantPolicy>,
    broker: ElevationBroker,
    launcher: Arc<dyn ToolLauncher>,
}

impl AccessContext {
    /// Starts a builder with the built-in policy, no approval authority
    /// and a launcher with no tools configured.
    #[must_use]
    pub fn builder(bootstrap: AuthBootstrap) -> AccessContextBuilder {
        AccessContextBuilder {
            bootstrap,
            policy: Arc::new(DefaultRolePolicy),
            authority: Arc::new(NoAuthority),
            launcher: Arc::new(ProcessLauncher::new()),
            clock: Arc::new(SystemClock),
            grant_duration: DEFAULT_GRANT_DURATION,
            approval_timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    /// Wires a context from validated configuration.
    ///
    /// No network traffic happens until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required identity setting is missing
    /// or the `[policy]` table is inconsistent.
    pub fn from_config(config: &OpsConfig) -> Result<Self, ConfigError> {
        let identity = config.identity.require()?;
        let policy: Arc<dyn RolePolicy> = match config.policy_table()? {
            Some(table) => Arc::new(table),
            None => Arc::new(DefaultRolePolicy),
        };

        let probe = Arc::new(HttpReachabilityProbe::new(&identity.url, &identity.realm));
        let provider = Arc::new(
            KeycloakProvider::new(
                &identity.url,
                &identity.realm,
                identity.client_id.as_str(),
                identity.redirect_uri.as_str(),
            )
            .with_token_cache(TokenCache::new(config.paths.token_cache_path())),
        );
        let bootstrap = AuthBootstrap::new(
            probe,
            provider,
            config.bootstrap.to_settings(identity.client_id.as_str()),
        );

        let elevation = &config.elevation;
        let authority: Arc<dyn ApprovalAuthority> = if elevation.auto_approve {
            tracing::warn!("elevation auto-approve is enabled; do not use in production");
            Arc::new(AutoApprove)
        } else if let Some(url) = &elevation.authority_url {
            Arc::new(HttpApprovalAuthority::new(
                url.as_str(),
                elevation.approval_timeout(),
            ))
        } else {
            Arc::new(NoAuthority)
        };

        Ok(Self::builder(bootstrap)
            .policy(policy)
            .authority(authority)
            .launcher(Arc::new(ProcessLauncher::from_config(&config.tools)))
            .grant_duration(elevation.duration())
            .approval_timeout(elevation.approval_timeout())
            .build())
    }

    // === Session ===

    #[must_use]
    pub fn bootstrap(&self) -> &AuthBootstrap {
        &self.bootstrap
    }

    pub async fn start(&self) -> BootstrapState {
        self.bootstrap.start().await
    }

    pub async fn retry(&self) -> BootstrapState {
        self.bootstrap.retry().await
    }

    pub async fn complete_login(&self, code: &str) -> BootstrapState {
        self.bootstrap.complete_login(code).await
    }

    /// Clears the session's grants, then signs out.
    pub async fn logout(&self) -> Option<SessionId> {
        self.clear_session_grants();
        self.bootstrap.logout().await
    }

    /// Clears the session's grants and abandons the session locally.
    pub fn shutdown(&self) {
        self.clear_session_grants();
        self.bootstrap.shutdown();
    }

    fn clear_session_grants(&self) {
        let state = self.bootstrap.state();
        let Some(subject) = state.subject() else {
            return;
        };
        if let Err(e) = self.grants.clear(subject.session_id()) {
            tracing::error!(error = %e, "failed to clear grants");
        }
    }

    /// The authenticated subject, if the session is ready.
    #[must_use]
    pub fn subject(&self) -> Option<Subject> {
        self.bootstrap.subject()
    }

    #[must_use]
    pub fn state(&self) -> BootstrapState {
        self.bootstrap.state()
    }

    // === Authorization ===

    #[must_use]
    pub fn policy(&self) -> &dyn RolePolicy {
        self.policy.as_ref()
    }

    #[must_use]
    pub fn grants(&self) -> &dyn GrantPolicy {
        self.grants.as_ref()
    }

    /// Decides whether the current subject may use `capability` now.
    ///
    /// # Errors
    ///
    /// Returns the [`AccessDenied`] reason.
    pub fn check(&self, capability: Capability) -> Result<(), AccessDenied> {
        let subject = self.subject().ok_or(AccessDenied::NoSession)?;
        let result = self.check_for(&subject, capability);
        match &result {
            Ok(()) => tracing::debug!(
                user = subject.user_id(),
                capability = %capability,
                "access allowed"
            ),
            Err(denied) => tracing::info!(
                user = subject.user_id(),
                role = %subject.role(),
                capability = %capability,
                reason = %denied,
                "access denied"
            ),
        }
        result
    }

    fn check_for(&self, subject: &Subject, capability: Capability) -> Result<(), AccessDenied> {
        match self.policy.classify(subject.role(), capability) {
            Access::Unconditional => Ok(()),
            Access::Forbidden => Err(AccessDenied::Forbidden {
                role: subject.role(),
                capability,
            }),
            Access::Elevatable => {
                // Expired grants stay until the next elevation or logout.
                // Lock failures are logged by the store and fail closed.
                match self.grants.status(subject.session_id(), capability) {
                    Ok(GrantStatus::Active { .. }) => Ok(()),
                    Ok(GrantStatus::Expired { expired_at }) => Err(AccessDenied::GrantExpired {
                        capability,
                        expired_at,
                    }),
                    Ok(GrantStatus::Missing) | Err(_) => {
                        Err(AccessDenied::ElevationRequired { capability })
                    }
                }
            }
        }
    }

    /// Every capability with the current subject's access to it.
    ///
    /// Empty without a ready session.
    #[must_use]
    pub fn capabilities(&self) -> Vec<CapabilityView> {
        let Some(subject) = self.subject() else {
            return Vec::new();
        };
        Capability::ALL
            .into_iter()
            .map(|capability| {
                let access = self.policy.classify(subject.role(), capability);
                let granted_until = match access {
                    Access::Elevatable => match self.grants.status(subject.session_id(), capability)
                    {
                        Ok(GrantStatus::Active { expires_at }) => Some(expires_at),
                        _ => None,
                    },
                    _ => None,
                };
                CapabilityView {
                    capability,
                    label: capability.label(),
                    access,
                    granted_until,
                    usable: self.check_for(&subject, capability).is_ok(),
                }
            })
            .collect()
    }

    /// Requests a time-limited grant for the current subject.
    ///
    /// # Errors
    ///
    /// [`ElevationError::InactiveSession`] without a ready session,
    /// otherwise as [`ElevationBroker::request_elevation`].
    pub async fn request_elevation(
        &self,
        capability: Capability,
        reason: &str,
    ) -> Result<ElevationOutcome, ElevationError> {
        let subject = self.subject().ok_or(ElevationError::InactiveSession)?;
        self.broker
            .request_elevation(&subject, capability, reason)
            .await
    }

    /// Launches `tool` if its capability check passes.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] without touching the launcher.
    pub fn launch(&self, tool: Tool) -> Result<LaunchResult, AccessDenied> {
        self.check(tool.required_capability())?;
        Ok(self.launcher.launch(tool))
    }
}
