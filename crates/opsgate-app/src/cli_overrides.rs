//! CLI configuration overrides.
//!
//! Implements [`ConfigResolver`] for command-line flags.

use opsgate_runtime::{ConfigResolver, OpsConfig};
use std::path::PathBuf;

/// CLI configuration overrides.
///
/// Applied as the highest priority layer after file/env config loading.
///
/// # Example
///
/// ```
/// use opsgate_app::CliOverrides;
/// use opsgate_runtime::{ConfigResolver, OpsConfig};
///
/// let mut config = OpsConfig::default();
/// CliOverrides::new()
///     .debug(true)
///     .realm("plant")
///     .apply(&mut config);
///
/// assert!(config.debug);
/// assert_eq!(config.identity.realm.as_deref(), Some("plant"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    verbose: Option<bool>,
    debug: Option<bool>,
    idp_url: Option<String>,
    realm: Option<String>,
    client_id: Option<String>,
    log_file: Option<PathBuf>,
    log_level: Option<String>,
}

impl CliOverrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = Some(value);
        self
    }

    #[must_use]
    pub fn debug(mut self, value: bool) -> Self {
        self.debug = Some(value);
        self
    }

    /// Identity provider base URL.
    #[must_use]
    pub fn idp_url(mut self, url: impl Into<String>) -> Self {
        self.idp_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    #[must_use]
    pub fn log_file(mut self, path: PathBuf) -> Self {
        self.log_file = Some(path);
        self
    }

    /// Filter directive for the log file.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Sets every override that is `Some`.
    #[must_use]
    pub fn identity_opt(
        mut self,
        idp_url: Option<String>,
        realm: Option<String>,
        client_id: Option<String>,
    ) -> Self {
        if idp_url.is_some() {
            self.idp_url = idp_url;
        }
        if realm.is_some() {
            self.realm = realm;
        }
        if client_id.is_some() {
            self.client_id = client_id;
        }
        self
    }

    #[must_use]
    pub fn logging_opt(mut self, file: Option<PathBuf>, level: Option<String>) -> Self {
        if file.is_some() {
            self.log_file = file;
        }
        if level.is_some() {
            self.log_level = level;
        }
        self
    }
}

impl ConfigResolver for CliOverrides {
    fn apply(&self, config: &mut OpsConfig) {
        if let Some(v) = self.verbose {
            config.verbose = v;
        }
        if let Some(d) = self.debug {
            config.debug = d;
        }
        if let Some(ref url) = self.idp_url {
            config.identity.url = Some(url.clone());
        }
        if let Some(ref realm) = self.realm {
            config.identity.realm = Some(realm.clone());
        }
        if let Some(ref id) = self.client_id {
            config.identity.client_id = Some(id.clone());
        }
        if let Some(ref p) = self.log_file {
            config.logging.file = Some(p.clone());
        }
        if let Some(ref level) = self.log_level {
            config.logging.file_level.clone_from(level);
        }
    }
}
