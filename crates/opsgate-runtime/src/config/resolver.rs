//! Override layer applied after file and environment loading.
//!
//! ```text
//! ConfigLoader.load()  →  OpsConfig (files + env)
//!                              │
//!                              ▼
//!                     ConfigResolver.apply()      e.g. CLI flags
//!                              │
//!                              ▼
//!                     OpsConfig.validate()
//! ```

use super::OpsConfig;

/// Applies overrides to a loaded configuration.
///
/// Implementors should only touch fields they have a value for.
pub trait ConfigResolver {
    fn apply(&self, config: &mut OpsConfig);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut OpsConfig) {}
}
