//! Application-level error type.
//!
//! [`AppError`] unifies the errors a console command can surface.

use opsgate_auth::AccessDenied;
use opsgate_runtime::{ConfigError, ElevationError};
use opsgate_types::ErrorCode;
use thiserror::Error;

/// Unified application error.
///
/// # Example
///
/// ```
/// use opsgate_app::AppError;
/// use opsgate_auth::AccessDenied;
///
/// let app_err: AppError = AccessDenied::NoSession.into();
/// assert_eq!(app_err.to_string(), "no active session");
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or is incomplete.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An access check refused the action.
    #[error(transparent)]
    Denied(#[from] AccessDenied),

    /// An elevation request did not reach a decision.
    #[error(transparent)]
    Elevation(#[from] ElevationError),

    /// Console input that is not a command.
    #[error("{0}")]
    Usage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for AppError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::Denied(e) => e.code(),
            Self::Elevation(e) => e.code(),
            Self::Usage(_) => "APP_USAGE",
            Self::Io(_) => "APP_IO_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(e) => e.is_recoverable(),
            Self::Denied(e) => e.is_recoverable(),
            Self::Elevation(e) => e.is_recoverable(),
            Self::Usage(_) => true,
            Self::Io(_) => true,
        }
    }
}
