//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use super::{default_config_dir, expand_tilde, ConfigError};
use crate::bootstrap::BootstrapSettings;
use opsgate_auth::{PolicySpec, PolicyTable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Redirect URI used when none is configured.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5173";

/// Main configuration structure, after merging all layers.
///
/// # Example
///
/// ```
/// use opsgate_runtime::config::OpsConfig;
///
/// let config = OpsConfig::default();
/// assert!(!config.debug);
/// assert!(!config.elevation.auto_approve);
/// assert!(config.validate().is_err());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpsConfig {
    /// Debug mode (debug-level terminal logging).
    pub debug: bool,

    /// Verbose mode (info-level terminal logging).
    pub verbose: bool,

    pub identity: IdentityConfig,
    pub bootstrap: BootstrapConfig,
    pub elevation: ElevationConfig,
    pub tools: ToolsConfig,

    /// Role policy table. Absent means the built-in policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicySpec>,

    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

impl OpsConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.debug != default.debug {
            self.debug = other.debug;
        }
        if other.verbose != default.verbose {
            self.verbose = other.verbose;
        }
        self.identity.merge(&other.identity);
        self.bootstrap.merge(&other.bootstrap);
        self.elevation.merge(&other.elevation);
        self.tools.merge(&other.tools);
        if other.policy.is_some() {
            self.policy = other.policy.clone();
        }
        self.paths.merge(&other.paths);
        self.logging.merge(&other.logging);
    }

    /// Checks that the configuration can start a console.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingSetting`] for an absent identity setting,
    /// [`ConfigError::Policy`] for an inconsistent `[policy]` table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identity.require()?;
        self.policy_table()?;
        Ok(())
    }

    /// Builds the configured policy table, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Policy`] if the table is inconsistent.
    pub fn policy_table(&self) -> Result<Option<PolicyTable>, ConfigError> {
        self.policy
            .as_ref()
            .map(PolicyTable::from_spec)
            .transpose()
            .map_err(ConfigError::from)
    }
}

/// `[identity]`: the OpenID Connect provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Provider base URL, e.g. `http://keycloak:8080`.
    pub url: Option<String>,
    pub realm: Option<String>,
    pub client_id: Option<String>,
    /// Where the provider sends the browser after login.
    pub redirect_uri: Option<String>,
}

/// Identity settings with every required value present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySettings {
    pub url: String,
    pub realm: String,
    pub client_id: String,
    pub redirect_uri: String,
}

impl IdentityConfig {
    fn merge(&mut self, other: &Self) {
        if other.url.is_some() {
            self.url = other.url.clone();
        }
        if other.realm.is_some() {
            self.realm = other.realm.clone();
        }
        if other.client_id.is_some() {
            self.client_id = other.client_id.clone();
        }
        if other.redirect_uri.is_some() {
            self.redirect_uri = other.redirect_uri.clone();
        }
    }

    /// Returns the settings, or the first missing one as an error.
    ///
    /// Blank values count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSetting`].
    pub fn require(&self) -> Result<IdentitySettings, ConfigError> {
        fn present(value: Option<&String>) -> Option<String> {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Ok(IdentitySettings {
            url: present(self.url.as_ref())
                .ok_or_else(|| ConfigError::missing("identity.url", "OPSGATE_IDP_URL"))?,
            realm: present(self.realm.as_ref())
                .ok_or_else(|| ConfigError::missing("identity.realm", "OPSGATE_IDP_REALM"))?,
            client_id: present(self.client_id.as_ref()).ok_or_else(|| {
                ConfigError::missing("identity.client_id", "OPSGATE_IDP_CLIENT_ID")
            })?,
            redirect_uri: present(self.redirect_uri.as_ref())
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        })
    }
}

/// `[bootstrap]`: session bootstrap timings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BootstrapConfig {
    pub probe_timeout_ms: u64,
    /// Bound on a whole bootstrap attempt.
    pub watchdog_ms: u64,
    /// Refresh this long before the access token expires.
    pub refresh_margin_secs: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            watchdog_ms: 10_000,
            refresh_margin_secs: 30,
        }
    }
}

impl BootstrapConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.probe_timeout_ms != default.probe_timeout_ms {
            self.probe_timeout_ms = other.probe_timeout_ms;
        }
        if other.watchdog_ms != default.watchdog_ms {
            self.watchdog_ms = other.watchdog_ms;
        }
        if other.refresh_margin_secs != default.refresh_margin_secs {
            self.refresh_margin_secs = other.refresh_margin_secs;
        }
    }

    #[must_use]
    pub fn to_settings(&self, client_id: impl Into<String>) -> BootstrapSettings {
        BootstrapSettings {
            client_id: client_id.into(),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            watchdog: Duration::from_millis(self.watchdog_ms),
            refresh_margin: Duration::from_secs(self.refresh_margin_secs),
        }
    }
}

/// `[elevation]`: grant lifetime and approval authority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ElevationConfig {
    /// Grant lifetime in minutes.
    pub duration_mins: u64,

    /// How long to wait for an approval decision.
    pub approval_timeout_ms: u64,

    /// Approve every elevation request without asking anyone.
    ///
    /// Development only.
    pub auto_approve: bool,

    /// Approval endpoint. Without it (and without `auto_approve`)
    /// every request fails.
    pub authority_url: Option<String>,
}

impl Default for ElevationConfig {
    fn default() -> Self {
        Self {
            duration_mins: 15,
            approval_timeout_ms: 300_000,
            auto_approve: false,
            authority_url: None,
        }
    }
}

impl ElevationConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.duration_mins != default.duration_mins {
            self.duration_mins = other.duration_mins;
        }
        if other.approval_timeout_ms != default.approval_timeout_ms {
            self.approval_timeout_ms = other.approval_timeout_ms;
        }
        if other.auto_approve != default.auto_approve {
            self.auto_approve = other.auto_approve;
        }
        if other.authority_url.is_some() {
            self.authority_url = other.authority_url.clone();
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_mins * 60)
    }

    #[must_use]
    pub fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }
}

/// `[tools]`: external executables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    pub wincc: Option<String>,
    pub hminavi: Option<String>,
}

impl ToolsConfig {
    fn merge(&mut self, other: &Self) {
        if other.wincc.is_some() {
            self.wincc = other.wincc.clone();
        }
        if other.hminavi.is_some() {
            self.hminavi = other.hminavi.clone();
        }
    }
}

/// `[paths]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Refresh token cache. Defaults to `~/.opsgate/token.json`.
    pub token_cache: Option<PathBuf>,

    /// Console history. Defaults to `~/.opsgate/history`.
    pub history_file: Option<PathBuf>,
}

impl PathsConfig {
    fn merge(&mut self, other: &Self) {
        if other.token_cache.is_some() {
            self.token_cache = other.token_cache.clone();
        }
        if other.history_file.is_some() {
            self.history_file = other.history_file.clone();
        }
    }

    #[must_use]
    pub fn token_cache_path(&self) -> PathBuf {
        self.token_cache
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| default_config_dir().join("token.json"))
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.history_file
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| default_config_dir().join("history"))
    }
}

/// `[logging]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Terminal filter directive. Overridden by `--debug`/`--verbose`.
    pub level: Option<String>,

    /// Log file. No file logging when absent.
    pub file: Option<PathBuf>,

    /// Filter directive for the log file.
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            file: None,
            file_level: "debug".into(),
        }
    }
}

impl LoggingConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.level.is_some() {
            self.level = other.level.clone();
        }
        if other.file.is_some() {
            self.file = other.file.clone();
        }
        if other.file_level != default.file_level {
            self.file_level = other.file_level.clone();
        }
    }
}
