//! Fixed-answer identity provider for console tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use opsgate_runtime::identity::{
    IdentityProvider, LoginRedirect, ProviderError, ReachabilityProbe, TokenSet,
};
use opsgate_runtime::{AuthBootstrap, BootstrapSettings};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const LOGIN_URL: &str = "https://idp.test/realms/plant/protocol/openid-connect/auth?state=s";

fn jwt(claims: &Value) -> String {
    let enc = |v: &Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap());
    format!("{}.{}.sig", enc(&json!({ "alg": "none" })), enc(claims))
}

#[derive(Debug)]
pub struct FixedProbe(pub bool);

#[async_trait]
impl ReachabilityProbe for FixedProbe {
    async fn probe(&self, _timeout: Duration) -> bool {
        self.0
    }
}

/// Provider with no stored session that accepts any authorization code
/// for the given role.
#[derive(Debug)]
pub struct InteractiveProvider {
    role: String,
}

impl InteractiveProvider {
    pub fn new(role: &str) -> Self {
        Self { role: role.into() }
    }

    fn tokens(&self) -> TokenSet {
        let claims = json!({
            "sub": "u-42",
            "sid": "sid-42",
            "name": "Grace",
            "realm_access": { "roles": [self.role] },
        });
        TokenSet::new(jwt(&claims), chrono::Utc::now() + chrono::Duration::hours(1))
            .with_refresh_token("rt")
    }
}

#[async_trait]
impl IdentityProvider for InteractiveProvider {
    async fn check_session(&self) -> Result<Option<TokenSet>, ProviderError> {
        Ok(None)
    }

    async fn login(&self) -> Result<LoginRedirect, ProviderError> {
        Ok(LoginRedirect {
            url: LOGIN_URL.to_string(),
        })
    }

    async fn complete_login(&self, code: &str) -> Result<TokenSet, ProviderError> {
        if code == "bad" {
            return Err(ProviderError::InvalidGrant("code rejected".into()));
        }
        Ok(self.tokens())
    }

    async fn refresh(&self, _tokens: &TokenSet) -> Result<TokenSet, ProviderError> {
        Ok(self.tokens())
    }

    async fn logout(&self, _tokens: &TokenSet) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub fn bootstrap(reachable: bool, role: &str) -> AuthBootstrap {
    AuthBootstrap::new(
        Arc::new(FixedProbe(reachable)),
        Arc::new(InteractiveProvider::new(role)),
        BootstrapSettings::new("operator-console"),
    )
}
