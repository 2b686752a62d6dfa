//! Core vocabulary for the opsgate operator console.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  opsgate-types   : Role, Capability, Subject, ErrorCode ◄── HERE
//! │  opsgate-auth    : RolePolicy, Grant, GrantPolicy, Clock   │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  opsgate-runtime : bootstrap, identity, broker, config     │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  opsgate-app     : interactive console                     │
//! │  opsgate-cli     : `opsgate` binary                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is plain data with no I/O.
//!
//! # Example
//!
//! ```
//! use opsgate_types::{Capability, Role, Tool};
//!
//! let role = Role::from_claims(["operator", "engineer"]);
//! assert_eq!(role, Role::Engineer);
//!
//! let cap: Capability = "edit_configuration".parse().unwrap();
//! assert_eq!(cap, Capability::EditConfiguration);
//! assert_eq!(Tool::Wincc.required_capability(), Capability::LaunchWincc);
//! ```

mod capability;
mod error;
mod role;
mod subject;

pub use capability::{Capability, Tool, UnknownCapability, UnknownTool};
pub use error::ErrorCode;
pub use role::{Role, UnknownRole};
pub use subject::{SessionId, Subject};
