//! Keycloak-style OpenID Connect provider.
//!
//! Endpoints under `{url}/realms/{realm}/protocol/openid-connect/`:
//!
//! | Call | Endpoint | Grant |
//! |------|----------|-------|
//! | `login` | `auth` (browser) | authorization code + PKCE S256 |
//! | `complete_login` | `token` | `authorization_code` |
//! | `check_session` / `refresh` | `token` | `refresh_token` |
//! | `logout` | `logout` | - |
//!
//! The non-interactive session check replays the refresh token kept in
//! the [`TokenCache`]. Without a cache every start is "no session".

use super::claims::TokenClaims;
use super::provider::{IdentityProvider, LoginRedirect, ProviderError, TokenSet};
use super::token_cache::TokenCache;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

/// Fallback token lifetime when the provider states none.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 300;

#[derive(Debug)]
struct PendingLogin {
    verifier: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl TokenResponse {
    /// Fails on an `expires_in` that does not fit a timestamp.
    fn into_token_set(self, now: DateTime<Utc>) -> Result<TokenSet, ProviderError> {
        let expires_at = match self.expires_in {
            Some(secs) => Some(
                chrono::TimeDelta::try_seconds(secs)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        ProviderError::Malformed(format!("expires_in out of range: {secs}"))
                    })?,
            ),
            None => TokenClaims::decode(&self.access_token)
                .ok()
                .and_then(|c| c.exp)
                .and_then(|exp| DateTime::from_timestamp(exp, 0)),
        }
        .unwrap_or_else(|| now + chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        let mut tokens = TokenSet::new(self.access_token, expires_at);
        if let Some(rt) = self.refresh_token {
            tokens = tokens.with_refresh_token(rt);
        }
        if let Some(id) = self.id_token {
            tokens = tokens.with_id_token(id);
        }
        Ok(tokens)
    }
}

/// Builds a PKCE verifier and its S256 challenge.
fn pkce_pair() -> (String, String) {
    let verifier = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    (verifier, challenge)
}

/// Splits operator input into `(code, state)`.
///
/// Accepts a bare code or the full redirect URL.
fn parse_code_input(input: &str) -> (String, Option<String>) {
    let input = input.trim();
    if let Ok(url) = reqwest::Url::parse(input) {
        let mut code = None;
        let mut state = None;
        for (k, v) in url.query_pairs() {
            match k.as_ref() {
                "code" => code = Some(v.into_owned()),
                "state" => state = Some(v.into_owned()),
                _ => {}
            }
        }
        if let Some(code) = code {
            return (code, state);
        }
    }
    (input.to_string(), None)
}

/// OpenID Connect provider speaking Keycloak's endpoint layout.
#[derive(Debug)]
pub struct KeycloakProvider {
    client: reqwest::Client,
    realm_url: String,
    client_id: String,
    redirect_uri: String,
    request_timeout: Duration,
    cache: Option<TokenCache>,
    pending: Mutex<Option<PendingLogin>>,
}

impl KeycloakProvider {
    #[must_use]
    pub fn new(
        base_url: &str,
        realm: &str,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            realm_url: format!("{}/realms/{}", base_url.trim_end_matches('/'), realm),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            request_timeout: Duration::from_secs(10),
            cache: None,
            pending: Mutex::new(None),
        }
    }

    /// Keeps the refresh token in `cache` between runs.
    #[must_use]
    pub fn with_token_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Bounds each HTTP exchange.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn realm_url(&self) -> &str {
        &self.realm_url
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/protocol/openid-connect/{name}", self.realm_url)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet, ProviderError> {
        let resp = self
            .client
            .post(self.endpoint("token"))
            .timeout(self.request_timeout)
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            let body: TokenResponse = resp
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            let tokens = body.into_token_set(Utc::now())?;
            self.remember(&tokens).await;
            return Ok(tokens);
        }

        let detail = resp.text().await.unwrap_or_default();
        match status.as_u16() {
            400 | 401 => Err(ProviderError::InvalidGrant(detail)),
            code => Err(ProviderError::Status {
                status: code,
                detail,
            }),
        }
    }

    async fn remember(&self, tokens: &TokenSet) {
        let (Some(cache), Some(rt)) = (&self.cache, tokens.refresh_token()) else {
            return;
        };
        if let Err(e) = cache.store(rt).await {
            tracing::warn!(error = %e, "failed to persist refresh token");
        }
    }

    async fn forget(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear().await {
                tracing::warn!(error = %e, "failed to clear token cache");
            }
        }
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<TokenSet, ProviderError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}

#[async_trait]
impl IdentityProvider for KeycloakProvider {
    async fn check_session(&self) -> Result<Option<TokenSet>, ProviderError> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let cached = match cache.load().await {
            Ok(Some(c)) => c,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable token cache");
                self.forget().await;
                return Ok(None);
            }
        };

        match self.refresh_with(&cached.refresh_token).await {
            Ok(tokens) => Ok(Some(tokens)),
            Err(ProviderError::InvalidGrant(detail)) => {
                tracing::info!(%detail, "cached session no longer valid");
                self.forget().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn login(&self) -> Result<LoginRedirect, ProviderError> {
        let (verifier, challenge) = pkce_pair();
        let state = Uuid::new_v4().simple().to_string();

        let url = reqwest::Url::parse_with_params(
            &self.endpoint("auth"),
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid"),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| ProviderError::Malformed(format!("login url: {e}")))?;

        *self.pending.lock() = Some(PendingLogin { verifier, state });
        Ok(LoginRedirect {
            url: url.to_string(),
        })
    }

    async fn complete_login(&self, code: &str) -> Result<TokenSet, ProviderError> {
        let pending = self
            .pending
            .lock()
            .take()
            .ok_or(ProviderError::NoPendingLogin)?;
        let (code, state) = parse_code_input(code);
        if state.is_some_and(|s| s != pending.state) {
            return Err(ProviderError::StateMismatch);
        }

        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", pending.verifier.as_str()),
        ])
        .await
    }

    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, ProviderError> {
        let rt = tokens.refresh_token().ok_or(ProviderError::NoRefreshToken)?;
        self.refresh_with(rt).await
    }

    async fn logout(&self, tokens: &TokenSet) -> Result<(), ProviderError> {
        self.forget().await;
        let Some(rt) = tokens.refresh_token() else {
            return Ok(());
        };

        let resp = self
            .client
            .post(self.endpoint("logout"))
            .timeout(self.request_timeout)
            .form(&[("client_id", self.client_id.as_str()), ("refresh_token", rt)])
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProviderError::Status {
                status: status.as_u16(),
                detail: resp.text().await.unwrap_or_default(),
            })
        }
    }
}
