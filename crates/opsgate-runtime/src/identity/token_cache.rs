//! On-disk refresh token cache.
//!
//! Lets a restarted console find an existing provider session without
//! user interaction. Only the refresh token is kept; grants are never
//! written anywhere.
//!
//! Writes go to a temp file first and are renamed into place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum TokenCacheError {
    #[error("token cache I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("token cache at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl TokenCacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Cached session material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSession {
    pub refresh_token: String,
    pub saved_at: DateTime<Utc>,
}

/// JSON file holding a [`CachedSession`].
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Reads the cache. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenCacheError`] for unreadable or corrupt files.
    pub async fn load(&self) -> Result<Option<CachedSession>, TokenCacheError> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TokenCacheError::io(&self.path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| TokenCacheError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Writes `refresh_token`, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns [`TokenCacheError`] if the file cannot be written.
    pub async fn store(&self, refresh_token: &str) -> Result<(), TokenCacheError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| TokenCacheError::io(dir, e))?;
        }
        let entry = CachedSession {
            refresh_token: refresh_token.to_string(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_vec(&entry).map_err(|source| TokenCacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let temp = self.temp_path();
        fs::write(&temp, &json)
            .await
            .map_err(|e| TokenCacheError::io(&temp, e))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| TokenCacheError::io(&self.path, e))
    }

    /// Deletes the cache. Missing is fine.
    ///
    /// # Errors
    ///
    /// Returns [`TokenCacheError`] if the file exists but cannot be removed.
    pub async fn clear(&self) -> Result<(), TokenCacheError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TokenCacheError::io(&self.path, e)),
        }
    }
}
