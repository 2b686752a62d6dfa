//! opsgate application layer.
//!
//! This crate provides:
//!
//! - **Console**: the operator command loop over an [`AccessContext`]
//! - **AppError**: unified application-level error type
//! - **CliOverrides**: command-line flags as a [`ConfigResolver`]
//! - **Re-exports**: what the binary needs from the lower layers
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Types Layer                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  opsgate-types (Role, Capability, Subject)                  │
//! │  opsgate-auth  (RolePolicy, GrantPolicy, AccessDenied)      │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Runtime Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  opsgate-runtime (bootstrap, identity, broker, config)      │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Application Layer  ◄── HERE                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  opsgate-app (Console + AppError)                           │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  opsgate-cli (uses AppError → anyhow)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod cli_overrides;
mod console;
mod error;
mod printer_slot;

pub use cli_overrides::CliOverrides;
pub use console::{
    describe_state, Console, ConsoleBuilder, ConsoleCommand, LoopControl, Reply, DEFAULT_REASON,
};
pub use error::AppError;
pub use printer_slot::{PrintResult, SharedPrinterSlot};

pub use opsgate_runtime::config::{expand_tilde, NoOpResolver};
pub use opsgate_runtime::{AccessContext, ConfigError, ConfigLoader, ConfigResolver, OpsConfig};
