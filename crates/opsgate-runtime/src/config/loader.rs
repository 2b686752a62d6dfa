//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.opsgate/config.toml`)
//! 3. Project config (`.opsgate/config.toml`)
//! 4. Environment variables (`OPSGATE_*`)
//!
//! Each layer overrides the previous.

use super::{default_config_path, ConfigError, OpsConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

macro_rules! parse_env_bool {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            $field = parse_bool(&val)
                .ok_or_else(|| ConfigError::invalid_env_var($var, "expected bool"))?;
        }
    };
}

macro_rules! parse_env_string {
    ($field:expr, $var:literal) => {
        if let Ok(val) = std::env::var($var) {
            if !val.trim().is_empty() {
                $field = Some(val.into());
            }
        }
    };
}

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```no_run
/// use opsgate_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_project_root("/srv/console")
///     .load()?;
/// # Ok::<(), opsgate_runtime::config::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to `~/.opsgate/config.toml`).
    global_config_path: Option<PathBuf>,
    project_root: Option<PathBuf>,
    skip_env: bool,
    skip_global: bool,
    skip_project: bool,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_global_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_config_path = Some(path.into());
        self
    }

    /// Project config will be loaded from `<project_root>/.opsgate/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// Does not validate; see [`OpsConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config file exists but cannot be parsed,
    /// or an environment variable has an invalid value.
    pub fn load(&self) -> Result<OpsConfig, ConfigError> {
        let mut config = OpsConfig::default();

        if !self.skip_global {
            let global_path = self
                .global_config_path
                .clone()
                .unwrap_or_else(default_config_path);

            if let Some(global) = load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global);
            }
        }

        if !self.skip_project {
            if let Some(ref root) = self.project_root {
                let path = root.join(PROJECT_CONFIG_DIR).join(PROJECT_CONFIG_FILE);
                if let Some(project) = load_file(&path)? {
                    debug!(path = %path.display(), "Loaded project config");
                    config.merge(&project);
                }
            }
        }

        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        Ok(config)
    }
}

/// Loads a config file, returning None if it doesn't exist.
fn load_file(path: &Path) -> Result<Option<OpsConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let config = OpsConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
    Ok(Some(config))
}

fn apply_env_vars(config: &mut OpsConfig) -> Result<(), ConfigError> {
    parse_env_bool!(config.debug, "OPSGATE_DEBUG");
    parse_env_bool!(config.verbose, "OPSGATE_VERBOSE");
    parse_env_bool!(config.elevation.auto_approve, "OPSGATE_AUTO_APPROVE");

    parse_env_string!(config.identity.url, "OPSGATE_IDP_URL");
    parse_env_string!(config.identity.realm, "OPSGATE_IDP_REALM");
    parse_env_string!(config.identity.client_id, "OPSGATE_IDP_CLIENT_ID");
    parse_env_string!(config.elevation.authority_url, "OPSGATE_AUTHORITY_URL");
    parse_env_string!(config.tools.wincc, "OPSGATE_WINCC_PATH");
    parse_env_string!(config.tools.hminavi, "OPSGATE_HMINAVI_PATH");
    parse_env_string!(config.paths.token_cache, "OPSGATE_TOKEN_CACHE");
    parse_env_string!(config.logging.level, "OPSGATE_LOG_LEVEL");

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn load_defaults_only() {
        let config = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .skip_env_vars()
            .load()
            .unwrap();
        assert_eq!(config, OpsConfig::default());
    }

    #[test]
    fn project_overrides_global() {
        let global = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();

        let global_path = write_config(
            global.path(),
            r#"
debug = true

[identity]
url = "http://global:8080"
realm = "plant"
"#,
        );
        write_config(
            &project.path().join(".opsgate"),
            r#"
[identity]
url = "http://project:8080"
"#,
        );

        let config = ConfigLoader::new()
            .with_global_config(&global_path)
            .with_project_root(project.path())
            .skip_env_vars()
            .load()
            .unwrap();

        assert!(config.debug);
        assert_eq!(config.identity.realm.as_deref(), Some("plant"));
        assert_eq!(config.identity.url.as_deref(), Some("http://project:8080"));
    }

    #[test]
    fn missing_files_ok() {
        let config = ConfigLoader::new()
            .with_global_config("/nonexistent/path/config.toml")
            .with_project_root("/nonexistent/project")
            .skip_env_vars()
            .load()
            .unwrap();
        assert_eq!(config, OpsConfig::default());
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), "[identity\nurl = ");
        let err = ConfigLoader::new()
            .with_global_config(&path)
            .skip_project_config()
            .skip_env_vars()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn parse_bool_values() {
        for s in ["true", "TRUE", "1", "yes", "on", " on "] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["false", "FALSE", "0", "no", "off"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn env_var_override() {
        std::env::set_var("OPSGATE_IDP_REALM", "env-realm");
        std::env::set_var("OPSGATE_WINCC_PATH", "/opt/wincc");

        let result = ConfigLoader::new()
            .skip_global_config()
            .skip_project_config()
            .load();

        std::env::remove_var("OPSGATE_IDP_REALM");
        std::env::remove_var("OPSGATE_WINCC_PATH");

        let config = result.unwrap();
        assert_eq!(config.identity.realm.as_deref(), Some("env-realm"));
        assert_eq!(config.tools.wincc.as_deref(), Some("/opt/wincc"));
    }
}
