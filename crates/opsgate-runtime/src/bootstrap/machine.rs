//! The authentication bootstrap state machine.
//!
//! # Attempts and epochs
//!
//! Every `start()` from `Idle`, every `retry()`, `logout()` and
//! `shutdown()` opens a new **epoch**. All asynchronous completions
//! (probe result, session check, login, refresh, watchdog) carry the
//! epoch they were started under and go through [`Shared::apply`], which
//! drops the transition if a newer epoch exists. A superseded attempt
//! therefore can never move the machine backwards.
//!
//! ```text
//!  start() ──► epoch N ──► spawn(select! {
//!                            sequence(N)      probe → check_session → {login | activate}
//!                            sleep(watchdog)  → Unreachable("not responding")
//!                          })
//!          ──► settled()
//! ```
//!
//! The attempt runs on its own task, owned by the machine rather than by
//! whichever caller started it. Callers only wait for the state to
//! settle, so dropping a caller's future never strands the machine. Opening
//! a new epoch aborts the running attempt; the `select!` then drops the
//! watchdog and the in-flight probe along with it.

use super::state::{BootstrapError, BootstrapPhase, BootstrapState, StateChange};
use crate::identity::{subject_from_token, IdentityProvider, ReachabilityProbe, TokenSet};
use opsgate_auth::{Clock, SessionLiveness, SystemClock};
use opsgate_types::{SessionId, Subject};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Timing and identity parameters.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    /// Client whose roles count toward the subject's role.
    pub client_id: String,
    /// Bound on the reachability probe.
    pub probe_timeout: Duration,
    /// Bound on a whole attempt.
    pub watchdog: Duration,
    /// How long before token expiry to refresh.
    pub refresh_margin: Duration,
}

impl BootstrapSettings {
    /// Settings with default timings: 5 s probe, 10 s watchdog, 30 s margin.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            probe_timeout: Duration::from_secs(5),
            watchdog: Duration::from_secs(10),
            refresh_margin: Duration::from_secs(30),
        }
    }
}

struct Core {
    epoch: u64,
    tokens: Option<Arc<TokenSet>>,
    attempt_task: Option<JoinHandle<()>>,
    refresh_task: Option<JoinHandle<()>>,
}

impl Core {
    fn stop_refresh(&mut self) {
        if let Some(handle) = self.refresh_task.take() {
            handle.abort();
        }
    }

    fn stop_attempt(&mut self) {
        if let Some(handle) = self.attempt_task.take() {
            handle.abort();
        }
    }
}

struct Shared {
    probe: Arc<dyn ReachabilityProbe>,
    provider: Arc<dyn IdentityProvider>,
    settings: BootstrapSettings,
    clock: Arc<dyn Clock>,
    core: Mutex<Core>,
    state_tx: watch::Sender<BootstrapState>,
    events: broadcast::Sender<StateChange>,
}

impl Shared {
    /// Publishes `next`. Caller holds the core lock.
    fn set_locked(&self, core: &Core, next: BootstrapState) {
        let from = self.state_tx.borrow().phase();
        let to = next.phase();
        match next.error() {
            Some(error) => tracing::warn!(epoch = core.epoch, %from, %to, %error, "bootstrap transition"),
            None => tracing::info!(epoch = core.epoch, %from, %to, "bootstrap transition"),
        }
        self.state_tx.send_replace(next);
        // No subscribers is fine.
        let _ = self.events.send(StateChange {
            epoch: core.epoch,
            from,
            to,
        });
    }

    /// Publishes `next` if `epoch` is still current.
    fn apply(&self, epoch: u64, next: BootstrapState) -> bool {
        let core = self.core.lock();
        if core.epoch != epoch {
            tracing::debug!(
                stale = epoch,
                current = core.epoch,
                discarded = %next.phase(),
                "discarding transition from superseded attempt"
            );
            return false;
        }
        self.set_locked(&core, next);
        true
    }

    /// Opens a new epoch. Caller holds the core lock.
    fn bump_locked(&self, core: &mut Core) -> u64 {
        core.epoch += 1;
        core.stop_attempt();
        core.stop_refresh();
        core.tokens = None;
        core.epoch
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.core.lock().epoch == epoch
    }

    fn state(&self) -> BootstrapState {
        self.state_tx.borrow().clone()
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let core = self.core.get_mut();
        core.stop_attempt();
        core.stop_refresh();
    }
}

/// Establishes and maintains the authenticated session.
///
/// Cheap to clone; clones share one machine. Each instance is an
/// independent session context, so tests build a fresh one each.
///
/// # Example
///
/// ```no_run
/// use opsgate_runtime::bootstrap::{AuthBootstrap, BootstrapSettings, BootstrapState};
/// use opsgate_runtime::identity::{HttpReachabilityProbe, KeycloakProvider};
/// use std::sync::Arc;
///
/// # async fn run() {
/// let probe = Arc::new(HttpReachabilityProbe::new("http://kc:8080", "plant"));
/// let provider = Arc::new(KeycloakProvider::new(
///     "http://kc:8080",
///     "plant",
///     "operator-console",
///     "http://localhost:5173",
/// ));
/// let bootstrap = AuthBootstrap::new(probe, provider, BootstrapSettings::new("operator-console"));
///
/// match bootstrap.start().await {
///     BootstrapState::Ready { subject } => println!("signed in as {subject}"),
///     BootstrapState::Redirecting { login_url } => println!("sign in at {login_url}"),
///     other => println!("{other}"),
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct AuthBootstrap {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AuthBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthBootstrap")
            .field("epoch", &self.epoch())
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl AuthBootstrap {
    /// Creates a machine in `Idle` on the system clock.
    #[must_use]
    pub fn new(
        probe: Arc<dyn ReachabilityProbe>,
        provider: Arc<dyn IdentityProvider>,
        settings: BootstrapSettings,
    ) -> Self {
        Self::with_clock(probe, provider, settings, Arc::new(SystemClock))
    }

    /// Creates a machine in `Idle` on `clock`.
    ///
    /// The clock decides token expiry; timers use tokio time.
    #[must_use]
    pub fn with_clock(
        probe: Arc<dyn ReachabilityProbe>,
        provider: Arc<dyn IdentityProvider>,
        settings: BootstrapSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state_tx, _) = watch::channel(BootstrapState::Idle);
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                probe,
                provider,
                settings,
                clock,
                core: Mutex::new(Core {
                    epoch: 0,
                    tokens: None,
                    attempt_task: None,
                    refresh_task: None,
                }),
                state_tx,
                events,
            }),
        }
    }

    // === Observation ===

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BootstrapState {
        self.shared.state()
    }

    #[must_use]
    pub fn phase(&self) -> BootstrapPhase {
        self.shared.state_tx.borrow().phase()
    }

    /// Current error, if the machine is `Unreachable` or `Failed`.
    #[must_use]
    pub fn error(&self) -> Option<BootstrapError> {
        self.shared.state_tx.borrow().error().cloned()
    }

    /// Current attempt number.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.shared.core.lock().epoch
    }

    /// Watches the latest state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<BootstrapState> {
        self.shared.state_tx.subscribe()
    }

    /// Receives every transition.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.shared.events.subscribe()
    }

    /// The authenticated subject, if `Ready` and the token is unexpired.
    ///
    /// Finding an expired token moves the machine to `Unreachable`
    /// with [`BootstrapError::SessionExpired`].
    #[must_use]
    pub fn subject(&self) -> Option<Subject> {
        let shared = &self.shared;
        let mut core = shared.core.lock();
        let BootstrapState::Ready { subject } = shared.state() else {
            return None;
        };
        let now = shared.clock.now();
        if core.tokens.as_ref().is_some_and(|t| t.is_expired_at(now)) {
            core.stop_refresh();
            core.tokens = None;
            shared.set_locked(
                &core,
                BootstrapState::Unreachable {
                    error: BootstrapError::SessionExpired,
                },
            );
            return None;
        }
        Some(subject)
    }

    /// Resolves once the machine reaches a settled state.
    pub async fn settled(&self) -> BootstrapState {
        let mut rx = self.shared.state_tx.subscribe();
        let settled = rx.wait_for(BootstrapState::is_settled).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    // === Lifecycle ===

    /// Runs the bootstrap sequence from `Idle`.
    ///
    /// Called again while an attempt is in flight, it awaits that
    /// attempt's outcome instead of launching a second one. Called after
    /// the attempt settled, it returns the settled state.
    ///
    /// The attempt does not depend on the caller: dropping the returned
    /// future leaves it running, watchdog included.
    pub async fn start(&self) -> BootstrapState {
        {
            let mut core = self.shared.core.lock();
            if self.shared.state_tx.borrow().phase() == BootstrapPhase::Idle {
                self.begin_attempt_locked(&mut core);
            }
        }
        self.settled().await
    }

    /// Restarts from `Unreachable` or `Failed` with a cleared error.
    ///
    /// In any other state this waits for the state to settle and
    /// returns it.
    pub async fn retry(&self) -> BootstrapState {
        {
            let mut core = self.shared.core.lock();
            let phase = self.shared.state_tx.borrow().phase();
            if matches!(phase, BootstrapPhase::Unreachable | BootstrapPhase::Failed) {
                self.begin_attempt_locked(&mut core);
            }
        }
        self.settled().await
    }

    /// Finishes interactive login with the redirect's authorization code.
    ///
    /// Only meaningful in `Redirecting`; otherwise returns the current
    /// state unchanged.
    ///
    /// Like [`start`](Self::start), the exchange runs on the machine's own
    /// task under the watchdog.
    pub async fn complete_login(&self, code: &str) -> BootstrapState {
        {
            let shared = &self.shared;
            let mut core = shared.core.lock();
            if shared.state_tx.borrow().phase() != BootstrapPhase::Redirecting {
                return shared.state();
            }
            shared.set_locked(&core, BootstrapState::Initializing);
            let epoch = core.epoch;
            let machine = self.clone();
            let code = code.to_owned();
            core.stop_attempt();
            core.attempt_task = Some(tokio::spawn(async move {
                machine.run_login(epoch, &code).await;
            }));
        }
        self.settled().await
    }

    /// Ends the session and returns to `Idle`.
    ///
    /// Late results from any earlier attempt are discarded. The provider
    /// is told best-effort; failures are logged, not returned.
    ///
    /// Returns the session that ended, if one was active.
    pub async fn logout(&self) -> Option<SessionId> {
        let (tokens, ended) = {
            let shared = &self.shared;
            let mut core = shared.core.lock();
            let ended = shared.state().subject().map(|s| s.session_id().clone());
            let tokens = core.tokens.clone();
            shared.bump_locked(&mut core);
            shared.set_locked(&core, BootstrapState::Idle);
            (tokens, ended)
        };

        if let Some(tokens) = tokens {
            let shared = &self.shared;
            match tokio::time::timeout(shared.settings.watchdog, shared.provider.logout(&tokens)).await
            {
                Ok(Ok(())) => tracing::info!("signed out at identity provider"),
                Ok(Err(e)) => tracing::warn!(error = %e, "identity provider logout failed"),
                Err(_) => tracing::warn!("identity provider logout timed out"),
            }
        }
        ended
    }

    /// Abandons any attempt and returns to `Idle` without contacting the
    /// provider.
    pub fn shutdown(&self) {
        let shared = &self.shared;
        let mut core = shared.core.lock();
        shared.bump_locked(&mut core);
        if shared.state_tx.borrow().phase() != BootstrapPhase::Idle {
            shared.set_locked(&core, BootstrapState::Idle);
        }
    }

    /// Refreshes the session now instead of waiting for the schedule.
    ///
    /// Returns `false` (and leaves `Ready`) if the refresh failed.
    pub async fn refresh_now(&self) -> bool {
        let epoch = self.epoch();
        self.refresh_once(epoch).await
    }

    // === Internals ===

    /// Opens an epoch, publishes `Probing` and spawns the attempt.
    /// Caller holds the core lock.
    fn begin_attempt_locked(&self, core: &mut Core) {
        let shared = &self.shared;
        let epoch = shared.bump_locked(core);
        shared.set_locked(core, BootstrapState::Probing);
        let machine = self.clone();
        core.attempt_task = Some(tokio::spawn(async move {
            machine.run_attempt(epoch).await;
        }));
    }

    async fn run_attempt(&self, epoch: u64) {
        let shared = &self.shared;
        tokio::select! {
            () = self.sequence(epoch) => {}
            () = tokio::time::sleep(shared.settings.watchdog) => {
                shared.apply(
                    epoch,
                    BootstrapState::Unreachable {
                        error: BootstrapError::NotResponding,
                    },
                );
            }
        }
    }

    async fn run_login(&self, epoch: u64, code: &str) {
        let shared = &self.shared;
        tokio::select! {
            result = shared.provider.complete_login(code) => match result {
                Ok(tokens) => {
                    if let Err(error) = self.activate(epoch, tokens) {
                        shared.apply(epoch, BootstrapState::Failed { error });
                    }
                }
                Err(e) => {
                    shared.apply(
                        epoch,
                        BootstrapState::Failed {
                            error: BootstrapError::LoginFailed(e.to_string()),
                        },
                    );
                }
            },
            () = tokio::time::sleep(shared.settings.watchdog) => {
                shared.apply(
                    epoch,
                    BootstrapState::Unreachable {
                        error: BootstrapError::NotResponding,
                    },
                );
            }
        }
    }

    async fn sequence(&self, epoch: u64) {
        let shared = &self.shared;

        if !shared.probe.probe(shared.settings.probe_timeout).await {
            shared.apply(
                epoch,
                BootstrapState::Unreachable {
                    error: BootstrapError::ProviderUnreachable,
                },
            );
            return;
        }
        if !shared.apply(epoch, BootstrapState::Initializing) {
            return;
        }

        let session = match shared.provider.check_session().await {
            Ok(session) => session,
            Err(e) => {
                shared.apply(
                    epoch,
                    BootstrapState::Unreachable {
                        error: BootstrapError::Provider(e.to_string()),
                    },
                );
                return;
            }
        };

        match session {
            Some(tokens) => {
                if let Err(error) = self.activate(epoch, tokens) {
                    shared.apply(epoch, BootstrapState::Unreachable { error });
                }
            }
            None => {
                if !shared.is_current(epoch) {
                    return;
                }
                let next = match shared.provider.login().await {
                    Ok(redirect) => BootstrapState::Redirecting {
                        login_url: redirect.url,
                    },
                    Err(e) => BootstrapState::Unreachable {
                        error: BootstrapError::Provider(e.to_string()),
                    },
                };
                shared.apply(epoch, next);
            }
        }
    }

    /// Derives the subject, publishes `SessionActive` then `Ready`, and
    /// schedules refresh.
    ///
    /// A stale epoch is silently ignored. Errors are for the caller to
    /// publish in the state that fits its path.
    fn activate(&self, epoch: u64, tokens: TokenSet) -> Result<(), BootstrapError> {
        let shared = &self.shared;
        let subject = subject_from_token(tokens.access_token(), &shared.settings.client_id)
            .map_err(|e| BootstrapError::MalformedToken(e.to_string()))?;

        let mut core = shared.core.lock();
        if core.epoch != epoch {
            tracing::debug!(stale = epoch, "discarding session from superseded attempt");
            return Ok(());
        }
        core.tokens = Some(Arc::new(tokens));
        shared.set_locked(
            &core,
            BootstrapState::SessionActive {
                subject: subject.clone(),
            },
        );
        shared.set_locked(&core, BootstrapState::Ready { subject });

        core.stop_refresh();
        let weak = Arc::downgrade(&self.shared);
        core.refresh_task = Some(tokio::spawn(refresh_loop(weak, epoch)));
        Ok(())
    }

    /// Time until the next scheduled refresh, or `None` if there is no
    /// session for `epoch`.
    fn refresh_delay(&self, epoch: u64) -> Option<Duration> {
        let shared = &self.shared;
        let core = shared.core.lock();
        if core.epoch != epoch {
            return None;
        }
        let tokens = core.tokens.as_ref()?;
        let margin = chrono::Duration::from_std(shared.settings.refresh_margin)
            .unwrap_or(chrono::Duration::zero());
        let due = tokens.expires_at() - margin;
        Some((due - shared.clock.now()).to_std().unwrap_or(Duration::ZERO))
    }

    async fn refresh_once(&self, epoch: u64) -> bool {
        let shared = &self.shared;
        let current = {
            let core = shared.core.lock();
            if core.epoch != epoch {
                return false;
            }
            let subject = shared.state().subject().cloned();
            core.tokens.clone().zip(subject)
        };
        let Some((tokens, subject)) = current else {
            return false;
        };

        let error = match shared.provider.refresh(&tokens).await {
            Ok(fresh) => {
                match subject_from_token(fresh.access_token(), &shared.settings.client_id) {
                    Ok(next) if next.same_identity(&subject) => {
                        let mut core = shared.core.lock();
                        if core.epoch != epoch {
                            return false;
                        }
                        tracing::debug!(expires_at = %fresh.expires_at(), "session refreshed");
                        core.tokens = Some(Arc::new(fresh));
                        return true;
                    }
                    Ok(_) => BootstrapError::IdentityChanged,
                    Err(e) => BootstrapError::MalformedToken(e.to_string()),
                }
            }
            Err(e) => BootstrapError::RefreshFailed(e.to_string()),
        };

        let mut core = shared.core.lock();
        if core.epoch != epoch {
            return false;
        }
        core.tokens = None;
        shared.set_locked(&core, BootstrapState::Unreachable { error });
        false
    }
}

async fn refresh_loop(weak: Weak<Shared>, epoch: u64) {
    loop {
        let delay = {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            match (AuthBootstrap { shared }).refresh_delay(epoch) {
                Some(delay) => delay,
                None => return,
            }
        };
        tokio::time::sleep(delay).await;

        let Some(shared) = weak.upgrade() else {
            return;
        };
        if !(AuthBootstrap { shared }).refresh_once(epoch).await {
            return;
        }
    }
}

impl SessionLiveness for AuthBootstrap {
    fn is_active(&self, session_id: &SessionId) -> bool {
        self.subject().is_some_and(|s| s.session_id() == session_id)
    }
}
