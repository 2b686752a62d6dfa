//! opsgate runtime: the session and privileged-access core.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Vocabulary Layer                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  opsgate-types : Role, Capability, Tool, Subject, ErrorCode │
//! │  opsgate-auth  : RolePolicy, Grant, GrantPolicy, AccessDenied│
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Runtime Layer (THIS CRATE)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  identity/  : IdentityProvider, ReachabilityProbe, tokens   │
//! │  bootstrap/ : AuthBootstrap state machine                   │
//! │  auth/      : DefaultGrantStore, ElevationBroker, approvers │
//! │  launcher   : ToolLauncher                                  │
//! │  context    : AccessContext (the gate)                      │
//! │  config/    : OpsConfig, layered loading                    │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Application Layer                          │
//! │  (opsgate-app: console + AppError, opsgate-cli: binary)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! ## [`bootstrap`] - Session Bootstrap
//!
//! - [`AuthBootstrap`]: probe → session check → login or ready,
//!   with epoch-guarded transitions and a watchdog
//! - [`BootstrapState`]: the observable state
//!
//! ## [`auth`] - Elevation
//!
//! - [`DefaultGrantStore`]: in-memory, time-bounded grants
//! - [`ElevationBroker`]: policy check, approval, grant
//!
//! ## [`context`] - Access Gate
//!
//! - [`AccessContext`]: `check`, `request_elevation`, `launch`

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod identity;
pub mod launcher;

pub use auth::{
    ApprovalAuthority, ApprovalDecision, ApprovalError, AutoApprove, DefaultGrantStore,
    ElevationBroker, ElevationError, ElevationOutcome, ElevationRequest, HttpApprovalAuthority,
    NoAuthority,
};
pub use bootstrap::{
    AuthBootstrap, BootstrapError, BootstrapPhase, BootstrapSettings, BootstrapState, StateChange,
};
pub use config::{ConfigError, ConfigLoader, ConfigResolver, OpsConfig};
pub use context::{AccessContext, AccessContextBuilder, CapabilityView};
pub use identity::{
    HttpReachabilityProbe, IdentityProvider, KeycloakProvider, LoginRedirect, ProviderError,
    ReachabilityProbe, TokenCache, TokenSet,
};
pub use launcher::{LaunchResult, ProcessLauncher, ToolLauncher};
