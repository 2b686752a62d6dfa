//! Scripted identity provider and probe for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use opsgate_runtime::identity::{
    IdentityProvider, LoginRedirect, ProviderError, ReachabilityProbe, TokenSet,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

pub const CLIENT_ID: &str = "operator-console";
pub const LOGIN_URL: &str = "https://idp.test/realms/plant/protocol/openid-connect/auth?state=s";

/// Builds an unsigned JWT carrying `claims`.
pub fn jwt(claims: &Value) -> String {
    let enc = |v: &Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap());
    format!("{}.{}.sig", enc(&json!({ "alg": "none" })), enc(claims))
}

/// Claims for `sub` with one realm role.
pub fn claims(sub: &str, role: &str, sid: &str) -> Value {
    json!({
        "sub": sub,
        "sid": sid,
        "name": format!("User {sub}"),
        "realm_access": { "roles": [role] },
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    Up,
    Down,
    /// Never answers.
    Hang,
}

/// Probe with a fixed answer and an optional gate on the first call.
#[derive(Debug)]
pub struct ScriptedProbe {
    mode: Mutex<ProbeMode>,
    delay: Duration,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(mode: ProbeMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            delay: Duration::ZERO,
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The first call waits for `gate` before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_mode(&self, mode: ProbeMode) {
        *self.mode.lock() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self, _timeout: Duration) -> bool {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mode = *self.mode.lock();
        match mode {
            ProbeMode::Up => true,
            ProbeMode::Down => false,
            ProbeMode::Hang => std::future::pending::<bool>().await,
        }
    }
}

/// Provider answering from scripted claims.
#[derive(Debug)]
pub struct ScriptedProvider {
    /// Claims of the existing session, if any.
    session: Mutex<Option<Value>>,
    /// Claims returned by `complete_login`; `None` fails the login.
    login_result: Mutex<Option<Value>>,
    /// Claims returned by `refresh`; `None` fails the refresh.
    refresh_result: Mutex<Option<Value>>,
    lifetime: chrono::Duration,
    issued_at: Mutex<Option<DateTime<Utc>>>,
    check_gate: Option<Arc<Notify>>,
    login_hangs: bool,
    pub check_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            session: Mutex::new(None),
            login_result: Mutex::new(None),
            refresh_result: Mutex::new(None),
            lifetime: chrono::Duration::hours(1),
            issued_at: Mutex::new(None),
            check_gate: None,
            login_hangs: false,
            check_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedProvider {
    pub fn no_session() -> Self {
        Self::default()
    }

    pub fn with_session(claims: Value) -> Self {
        let provider = Self::default();
        *provider.session.lock() = Some(claims);
        provider
    }

    pub fn with_lifetime(mut self, lifetime: chrono::Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Token lifetimes count from `at` instead of the wall clock.
    pub fn issued_at(self, at: DateTime<Utc>) -> Self {
        *self.issued_at.lock() = Some(at);
        self
    }

    /// The first `check_session` waits for `gate`.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.check_gate = Some(gate);
        self
    }

    /// `complete_login` never answers.
    pub fn hanging_login(mut self) -> Self {
        self.login_hangs = true;
        self
    }

    pub fn set_login_result(&self, claims: Option<Value>) {
        *self.login_result.lock() = claims;
    }

    pub fn set_refresh_result(&self, claims: Option<Value>) {
        *self.refresh_result.lock() = claims;
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn tokens(&self, claims: &Value) -> TokenSet {
        let issued = (*self.issued_at.lock()).unwrap_or_else(Utc::now);
        TokenSet::new(jwt(claims), issued + self.lifetime).with_refresh_token("rt")
    }
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
    async fn check_session(&self) -> Result<Option<TokenSet>, ProviderError> {
        let n = self.check_calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            if let Some(gate) = &self.check_gate {
                gate.notified().await;
            }
        }
        let claims = self.session.lock().clone();
        Ok(claims.map(|c| self.tokens(&c)))
    }

    async fn login(&self) -> Result<LoginRedirect, ProviderError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(LoginRedirect {
            url: LOGIN_URL.to_string(),
        })
    }

    async fn complete_login(&self, _code: &str) -> Result<TokenSet, ProviderError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        if self.login_hangs {
            std::future::pending::<()>().await;
        }
        let claims = self.login_result.lock().clone();
        claims
            .map(|c| self.tokens(&c))
            .ok_or_else(|| ProviderError::InvalidGrant("code rejected".into()))
    }

    async fn refresh(&self, _tokens: &TokenSet) -> Result<TokenSet, ProviderError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let claims = self.refresh_result.lock().clone();
        claims
            .map(|c| self.tokens(&c))
            .ok_or_else(|| ProviderError::InvalidGrant("session not active".into()))
    }

    async fn logout(&self, _tokens: &TokenSet) -> Result<(), ProviderError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
