//! Shared error code interface.
//!
//! Every error enum in the opsgate crates implements [`ErrorCode`] so the
//! console can print a stable code next to the message and decide whether
//! offering `retry` makes sense.
//!
//! # Example
//!
//! ```
//! use opsgate_types::ErrorCode;
//!
//! #[derive(Debug)]
//! enum ProbeError {
//!     Timeout,
//!     BadRealm(String),
//! }
//!
//! impl ErrorCode for ProbeError {
//!     fn code(&self) -> &'static str {
//!         match self {
//!             Self::Timeout => "PROBE_TIMEOUT",
//!             Self::BadRealm(_) => "PROBE_BAD_REALM",
//!         }
//!     }
//!
//!     fn is_recoverable(&self) -> bool {
//!         matches!(self, Self::Timeout)
//!     }
//! }
//!
//! assert_eq!(ProbeError::Timeout.code(), "PROBE_TIMEOUT");
//! assert!(!ProbeError::BadRealm("x".into()).is_recoverable());
//! ```

/// Machine-readable classification of an error.
///
/// # Code Format
///
/// - UPPER_SNAKE_CASE, prefixed with the owning domain
///   (`"AUTH_"`, `"BOOTSTRAP_"`, `"CONFIG_"`, ...)
/// - Stable once published
///
/// # Recoverability
///
/// An error is recoverable when an operator-initiated retry may succeed
/// (provider down, timeout, expired grant that can be re-requested).
/// Configuration mistakes and policy denials are not.
pub trait ErrorCode {
    /// Returns the stable error code.
    fn code(&self) -> &'static str;

    /// Returns `true` if an explicit retry may succeed.
    fn is_recoverable(&self) -> bool;
}
