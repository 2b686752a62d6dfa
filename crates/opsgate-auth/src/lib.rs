//! Authorization primitives for opsgate.
//!
//! # Access Model
//!
//! ```text
//! Allowed(subject, cap) =
//!     RolePolicy(role, cap) == Unconditional
//!   ∨ ( RolePolicy(role, cap) == Elevatable
//!       ∧ Grant(session, cap).expires_at > now
//!       ∧ session is active )
//! ```
//!
//! | Piece | Type | Controls |
//! |-------|------|----------|
//! | [`RolePolicy`] | Trait | What a role holds or may request |
//! | [`Grant`] + [`GrantPolicy`] | Struct + Trait | Time-limited elevations |
//! | [`Clock`] | Trait | The time grants are judged against |
//! | [`AccessDenied`] | Error | Why an action was refused |
//!
//! # Crate Architecture
//!
//! ```text
//! opsgate-types  (Role, Capability, Subject)
//!      ↑
//! opsgate-auth   ◄── THIS CRATE (traits, pure logic, no I/O)
//!      ↑
//! opsgate-runtime (DefaultGrantStore, ElevationBroker, AuthBootstrap)
//! ```
//!
//! Trait definitions live here; stateful implementations live in
//! `opsgate-runtime`.

pub mod clock;
pub mod error;
pub mod grant;
pub mod policy;
pub mod table;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AccessDenied;
pub use grant::{Grant, GrantError, GrantPolicy, GrantStatus, SessionLiveness};
pub use policy::{validate_policy, Access, DefaultRolePolicy, PolicyError, RolePolicy};
pub use table::{PolicySpec, PolicyTable, RoleEntry};
