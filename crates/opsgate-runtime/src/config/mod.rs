//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌──────────────────────────────────────────┐
//! │  1. Resolver (CLI flags)                 │  Per-invocation
//! ├──────────────────────────────────────────┤
//! │  2. Environment Variables (OPSGATE_*)    │  Runtime override
//! ├──────────────────────────────────────────┤
//! │  3. Project Config (.opsgate/config.toml)│  Site-specific
//! ├──────────────────────────────────────────┤
//! │  4. Global Config (~/.opsgate/config.toml)│ User defaults
//! ├──────────────────────────────────────────┤
//! │  5. Default Values (compile-time)        │  Fallback
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `OPSGATE_DEBUG` | `debug` | bool |
//! | `OPSGATE_VERBOSE` | `verbose` | bool |
//! | `OPSGATE_IDP_URL` | `identity.url` | String |
//! | `OPSGATE_IDP_REALM` | `identity.realm` | String |
//! | `OPSGATE_IDP_CLIENT_ID` | `identity.client_id` | String |
//! | `OPSGATE_AUTO_APPROVE` | `elevation.auto_approve` | bool |
//! | `OPSGATE_AUTHORITY_URL` | `elevation.authority_url` | String |
//! | `OPSGATE_WINCC_PATH` | `tools.wincc` | String |
//! | `OPSGATE_HMINAVI_PATH` | `tools.hminavi` | String |
//! | `OPSGATE_TOKEN_CACHE` | `paths.token_cache` | PathBuf |
//! | `OPSGATE_LOG_LEVEL` | `logging.level` | String |
//!
//! # Example Configuration
//!
//! ```toml
//! [identity]
//! url = "http://localhost:8080"
//! realm = "plant"
//! client_id = "operator-console"
//!
//! [elevation]
//! duration_mins = 15
//! authority_url = "https://pam.example/api/elevations"
//!
//! [tools]
//! wincc = "C:\\WinCC\\runtime.exe"
//! ```

mod error;
mod loader;
mod resolver;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use resolver::{ConfigResolver, NoOpResolver};
pub use types::{
    BootstrapConfig, ElevationConfig, IdentityConfig, IdentitySettings, LoggingConfig, OpsConfig,
    PathsConfig, ToolsConfig, DEFAULT_REDIRECT_URI,
};

use std::path::{Path, PathBuf};

/// Default global config directory.
pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".opsgate")
}

/// Default global config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".opsgate";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
