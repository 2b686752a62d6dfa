//! Identity provider boundary.
//!
//! The bootstrap state machine sees the identity provider only through
//! [`IdentityProvider`]. Every call is an opaque network operation that
//! may fail, hang, or succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use opsgate_types::ErrorCode;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use thiserror::Error;

/// Tokens for an authenticated session.
pub struct TokenSet {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    id_token: Option<SecretString>,
    expires_at: DateTime<Utc>,
}

impl TokenSet {
    #[must_use]
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: None,
            id_token: None,
            expires_at,
        }
    }

    #[must_use]
    pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::from(token.into()));
        self
    }

    #[must_use]
    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(SecretString::from(token.into()));
        self
    }

    /// Bearer token carrying the role claims.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_ref().map(|t| t.expose_secret())
    }

    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_ref().map(|t| t.expose_secret())
    }

    /// When the access token stops being valid.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    #[must_use]
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.expires_at
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.is_some())
            .field("id_token", &self.id_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where to send the operator for interactive login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub url: String,
}

/// Failure of an identity provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Request could not be sent or the reply not read.
    #[error("identity provider request failed: {0}")]
    Transport(String),

    /// Unexpected HTTP status.
    #[error("identity provider returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    /// The provider rejected the grant (expired or revoked session).
    #[error("identity provider rejected the grant: {0}")]
    InvalidGrant(String),

    /// Reply could not be understood.
    #[error("malformed identity provider reply: {0}")]
    Malformed(String),

    /// `complete_login` without a preceding `login`.
    #[error("no interactive login in progress")]
    NoPendingLogin,

    /// Redirect `state` did not match the pending login.
    #[error("login state mismatch")]
    StateMismatch,

    /// The session has no refresh token.
    #[error("session has no refresh token")]
    NoRefreshToken,
}

impl ErrorCode for ProviderError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "IDP_TRANSPORT",
            Self::Status { .. } => "IDP_STATUS",
            Self::InvalidGrant(_) => "IDP_INVALID_GRANT",
            Self::Malformed(_) => "IDP_MALFORMED",
            Self::NoPendingLogin => "IDP_NO_PENDING_LOGIN",
            Self::StateMismatch => "IDP_STATE_MISMATCH",
            Self::NoRefreshToken => "IDP_NO_REFRESH_TOKEN",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

/// Operations the console needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Looks for an existing session without user interaction.
    ///
    /// `Ok(None)` means "no session", not a failure.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider could not be asked.
    async fn check_session(&self) -> Result<Option<TokenSet>, ProviderError>;

    /// Starts interactive login and returns where to send the operator.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the redirect cannot be prepared.
    async fn login(&self) -> Result<LoginRedirect, ProviderError>;

    /// Finishes interactive login with the code from the redirect.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the exchange fails.
    async fn complete_login(&self, code: &str) -> Result<TokenSet, ProviderError>;

    /// Obtains fresh tokens before `tokens` expire.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the session cannot be refreshed.
    async fn refresh(&self, tokens: &TokenSet) -> Result<TokenSet, ProviderError>;

    /// Ends the session at the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the provider could not be told.
    async fn logout(&self, tokens: &TokenSet) -> Result<(), ProviderError>;
}
