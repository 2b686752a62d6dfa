//! Session bootstrap.
//!
//! Probes the identity provider, looks for an existing session, and
//! either lands in `Ready` with a [`Subject`](opsgate_types::Subject) or
//! hands the operator a login URL. Once `Ready`, the session is refreshed
//! in the background until it ends.

mod machine;
mod state;

pub use machine::{AuthBootstrap, BootstrapSettings};
pub use state::{BootstrapError, BootstrapPhase, BootstrapState, StateChange};
