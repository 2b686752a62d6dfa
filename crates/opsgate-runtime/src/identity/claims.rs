//! Token claims and subject derivation.
//!
//! Only the JWT payload is read. Signature verification is the identity
//! provider's job; tokens reach us over TLS straight from it.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use opsgate_types::{Role, SessionId, Subject};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Why a token could not be turned into a subject.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    #[error("token is not a JWT")]
    NotAJwt,

    #[error("token payload is not base64url: {0}")]
    Encoding(String),

    #[error("token payload is not a claims object: {0}")]
    Payload(String),

    #[error("token has no subject claim")]
    MissingSubject,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RoleList {
    /// `null` reads as no roles.
    #[serde(default)]
    roles: Option<Vec<Value>>,
}

impl RoleList {
    fn iter(&self) -> impl Iterator<Item = &Value> {
        self.roles.iter().flatten()
    }
}

/// Claims read from an access token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    /// Provider session id.
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    realm_access: Option<RoleList>,
    #[serde(default)]
    resource_access: Option<HashMap<String, Option<RoleList>>>,
}

impl TokenClaims {
    /// Decodes the payload segment of `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError`] for anything that is not a three-part JWT
    /// with a JSON object payload.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ClaimsError::NotAJwt);
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| ClaimsError::Encoding(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ClaimsError::Payload(e.to_string()))
    }

    /// Role claims: realm roles plus roles of `client_id`.
    ///
    /// Non-string entries are ignored.
    pub fn role_claims<'a>(&'a self, client_id: &str) -> impl Iterator<Item = &'a str> + 'a {
        let realm = self.realm_access.iter().flat_map(RoleList::iter);
        let client = self
            .resource_access
            .as_ref()
            .and_then(|clients| clients.get(client_id))
            .and_then(Option::as_ref)
            .into_iter()
            .flat_map(RoleList::iter);
        realm.chain(client).filter_map(Value::as_str)
    }

    /// Resolved role. Never fails; see [`Role::from_claims`].
    #[must_use]
    pub fn role(&self, client_id: &str) -> Role {
        Role::from_claims(self.role_claims(client_id))
    }

    /// Builds the subject for this token.
    ///
    /// The session id is the provider's `sid` when present, otherwise a
    /// fresh local id.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::MissingSubject`] if `sub` is absent or empty.
    pub fn to_subject(&self, client_id: &str) -> Result<Subject, ClaimsError> {
        let user_id = self
            .sub
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ClaimsError::MissingSubject)?;
        let display_name = self
            .name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .unwrap_or(user_id);
        let session_id = self
            .sid
            .as_deref()
            .filter(|s| !s.is_empty())
            .map_or_else(SessionId::generate, SessionId::new);
        Ok(Subject::new(
            user_id,
            display_name,
            self.role(client_id),
            session_id,
        ))
    }
}

/// Derives the subject from a raw access token.
///
/// # Errors
///
/// Returns [`ClaimsError`] if the token is malformed or lacks a subject.
pub fn subject_from_token(token: &str, client_id: &str) -> Result<Subject, ClaimsError> {
    TokenClaims::decode(token)?.to_subject(client_id)
}

/// Test helper: builds an unsigned JWT around `claims`.
#[cfg(test)]
pub(crate) fn encode_unsigned(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}
