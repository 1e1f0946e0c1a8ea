//! Clinic Media Vault - Configuration
//!
//! Endpoints, the sandbox gate, and the pipeline size/quality knobs.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable enabling sandbox mode
pub const SANDBOX_ENV: &str = "CLINIC_MEDIA_SANDBOX";

/// Environment variable overriding the keystore endpoint
pub const KEYSTORE_URL_ENV: &str = "CLINIC_MEDIA_KEYSTORE_URL";

/// Environment variable overriding the blob store endpoint
pub const STORAGE_URL_ENV: &str = "CLINIC_MEDIA_STORAGE_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Remote keystore base URL
    pub keystore_url: String,
    /// Remote blob store base URL
    pub storage_url: String,
    /// Sandbox mode: in-memory backends and the fixed fallback key.
    /// Never enable in an environment handling real patient data.
    pub sandbox: bool,
    /// JPEG quality for captured photos (1-100)
    pub jpeg_quality: u8,
    /// Longest edge a captured photo is clamped to before encryption
    pub max_upload_dimension: u32,
    /// Download cap for a single encrypted blob, in bytes
    pub max_download_bytes: u64,
    /// Square edge of gallery thumbnails
    pub thumb_size: u32,
    /// Remote request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            keystore_url: "https://keystore.clinic-vault.example".into(),
            storage_url: "https://blobs.clinic-vault.example".into(),
            sandbox: false,
            jpeg_quality: 85,
            max_upload_dimension: 1920,
            max_download_bytes: 10 * 1024 * 1024,
            thumb_size: 256,
            request_timeout_secs: 30,
        }
    }
}

impl VaultConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(KEYSTORE_URL_ENV) {
            config.keystore_url = url;
        }
        if let Ok(url) = std::env::var(STORAGE_URL_ENV) {
            config.storage_url = url;
        }
        if let Ok(flag) = std::env::var(SANDBOX_ENV) {
            config.sandbox = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Sandbox config: in-memory backends, fallback key
    pub fn sandbox() -> Self {
        Self {
            sandbox: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_sane() {
        let config = VaultConfig::default();
        assert!(!config.sandbox);
        assert!(config.jpeg_quality <= 100);
        assert!(config.max_download_bytes > 0);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");

        let mut config = VaultConfig::sandbox();
        config.thumb_size = 128;
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        let loaded = VaultConfig::load(&path).unwrap();
        assert!(loaded.sandbox);
        assert_eq!(loaded.thumb_size, 128);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            VaultConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
