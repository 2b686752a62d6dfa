//! Stateful authorization: grant storage, approval, elevation.
//!
//! Trait definitions are in `opsgate-auth`; this module provides the
//! implementations that need I/O or shared state.

mod approval;
mod broker;
mod grant_store;

pub use approval::{
    ApprovalAuthority, ApprovalDecision, ApprovalError, AutoApprove, ElevationRequest,
    HttpApprovalAuthority, NoAuthority,
};
pub use broker::{
    ElevationBroker, ElevationError, ElevationOutcome, DEFAULT_APPROVAL_TIMEOUT,
    DEFAULT_GRANT_DURATION,
};
pub use grant_store::DefaultGrantStore;
