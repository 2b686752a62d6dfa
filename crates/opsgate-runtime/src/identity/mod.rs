//! Identity provider integration.
//!
//! ```text
//! AuthBootstrap
//!     │
//!     ├── ReachabilityProbe ──► GET  .well-known/openid-configuration
//!     └── IdentityProvider  ──► POST token / logout, browser → auth
//!              │
//!              └── TokenCache (refresh token on disk)
//! ```

mod claims;
mod keycloak;
mod probe;
mod provider;
mod token_cache;

pub use claims::{subject_from_token, ClaimsError, TokenClaims};
pub use keycloak::KeycloakProvider;
pub use probe::{HttpReachabilityProbe, ReachabilityProbe, DEFAULT_PROBE_TIMEOUT};
pub use provider::{IdentityProvider, LoginRedirect, ProviderError, TokenSet};
pub use token_cache::{CachedSession, TokenCache, TokenCacheError};

#[cfg(test)]
pub(crate) use claims::encode_unsigned;
