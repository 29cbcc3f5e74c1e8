//! Sync configuration
//!
//! Loaded from an optional `config.json` in the data directory; anything not
//! set falls back to the defaults below.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// File name of the optional configuration file inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_SERVER_URL: &str = "http://localhost:8080/api/";

/// Runtime configuration for the sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the content server
    pub server_url: String,
    /// Directory holding the database and downloaded media
    pub data_dir: PathBuf,
    /// Timeout for event, record and file requests
    pub request_timeout_secs: u64,
    /// Timeout for the reachability check
    pub connectivity_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            data_dir: default_data_dir(),
            request_timeout_secs: 30,
            connectivity_timeout_secs: 5,
        }
    }
}

/// `~/.mediasync`, or `./.mediasync` when there is no home directory.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mediasync")
}

impl SyncConfig {
    /// Load configuration from a JSON file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data)
            .map_err(|e| SyncError::Config(format!("{}: {e}", path.display())))
    }

    /// Load `config.json` from `data_dir`, keeping `data_dir` itself.
    pub fn load_from_dir(data_dir: impl AsRef<Path>) -> Result<Self, SyncError> {
        let data_dir = data_dir.as_ref();
        let mut config = Self::load(data_dir.join(CONFIG_FILE_NAME))?;
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    /// Server URL normalized to end with a slash.
    pub fn server_base(&self) -> String {
        if self.server_url.ends_with('/') {
            self.server_url.clone()
        } else {
            format!("{}/", self.server_url)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("mediasync.redb")
    }

    pub fn media_dir(&self) -> PathBuf {
        self.data_dir.join("media")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SyncConfig::load(temp.path().join("nope.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            r#"{"server_url": "https://example.org/api"}"#,
        )
        .unwrap();

        let config = SyncConfig::load_from_dir(temp.path()).unwrap();
        assert_eq!(config.server_base(), "https://example.org/api/");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.data_dir, temp.path());
        assert_eq!(config.database_path(), temp.path().join("mediasync.redb"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SyncConfig::load(&path),
            Err(SyncError::Config(_))
        ));
    }
}
