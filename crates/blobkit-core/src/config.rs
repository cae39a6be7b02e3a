//! Configuration module
//!
//! Client configuration loaded from the environment (and a `.env` file when
//! present): which backend to use, remote credentials, the local directory
//! and quota, transport timeout and upload part size.

use std::env;
use std::path::PathBuf;

use anyhow::Context;

use crate::constants::{
    DEFAULT_AUTH_URL, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PART_SIZE, MIN_REMOTE_PART_SIZE,
};
use crate::storage_types::{ApiVersion, StorageBackend};

/// Storage client configuration
#[derive(Clone)]
pub struct ClientConfig {
    pub storage_backend: StorageBackend,
    // Remote configuration
    pub key_id: Option<String>,
    pub application_key: Option<String>,
    pub bucket_id: Option<String>,
    pub api_version: ApiVersion,
    pub auth_url: String,
    // Local configuration
    pub local_storage_path: Option<PathBuf>,
    /// 0 = unlimited
    pub local_storage_quota_bytes: u64,
    // Transport / upload behavior
    pub http_timeout_secs: u64,
    pub part_size_bytes: usize,
    pub logging_enabled: bool,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("storage_backend", &self.storage_backend)
            .field("key_id", &self.key_id)
            .field("application_key", &self.application_key.as_ref().map(|_| "***"))
            .field("bucket_id", &self.bucket_id)
            .field("api_version", &self.api_version)
            .field("auth_url", &self.auth_url)
            .field("local_storage_path", &self.local_storage_path)
            .field("local_storage_quota_bytes", &self.local_storage_quota_bytes)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("part_size_bytes", &self.part_size_bytes)
            .field("logging_enabled", &self.logging_enabled)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            storage_backend: StorageBackend::Remote,
            key_id: None,
            application_key: None,
            bucket_id: None,
            api_version: ApiVersion::default(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            local_storage_path: None,
            local_storage_quota_bytes: 0,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            part_size_bytes: DEFAULT_PART_SIZE,
            logging_enabled: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ClientConfig::default();

        // Storage backend configuration
        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value
                .parse::<StorageBackend>()
                .context("STORAGE_BACKEND must be 'remote' or 'local'")?,
            None => defaults.storage_backend,
        };

        let api_version = match lookup("B2_API_VERSION") {
            Some(value) => value
                .parse::<ApiVersion>()
                .context("B2_API_VERSION must be 'v2' or 'v3'")?,
            None => defaults.api_version,
        };

        let local_storage_quota_bytes = match lookup("LOCAL_STORAGE_QUOTA_BYTES") {
            Some(value) => value
                .parse()
                .context("LOCAL_STORAGE_QUOTA_BYTES must be a non-negative integer")?,
            None => defaults.local_storage_quota_bytes,
        };

        let http_timeout_secs = lookup("HTTP_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.http_timeout_secs);

        let part_size_bytes = match lookup("UPLOAD_PART_SIZE_BYTES") {
            Some(value) => value
                .parse()
                .context("UPLOAD_PART_SIZE_BYTES must be a positive integer")?,
            None => defaults.part_size_bytes,
        };

        let logging_enabled = lookup("STORAGE_LOGGING")
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(defaults.logging_enabled);

        Ok(ClientConfig {
            storage_backend,
            key_id: lookup("B2_KEY_ID"),
            application_key: lookup("B2_APPLICATION_KEY"),
            bucket_id: lookup("B2_BUCKET_ID"),
            api_version,
            auth_url: lookup("B2_AUTH_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.auth_url),
            local_storage_path: lookup("LOCAL_STORAGE_PATH").map(PathBuf::from),
            local_storage_quota_bytes,
            http_timeout_secs,
            part_size_bytes,
            logging_enabled,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.part_size_bytes == 0 {
            return Err(anyhow::anyhow!("UPLOAD_PART_SIZE_BYTES must be greater than 0"));
        }

        if self.http_timeout_secs == 0 {
            return Err(anyhow::anyhow!("HTTP_TIMEOUT_SECS must be greater than 0"));
        }

        match self.storage_backend {
            StorageBackend::Remote => {
                if self.key_id.as_deref().unwrap_or_default().is_empty() {
                    return Err(anyhow::anyhow!(
                        "B2_KEY_ID must be set when using the remote storage backend"
                    ));
                }
                if self.application_key.as_deref().unwrap_or_default().is_empty() {
                    return Err(anyhow::anyhow!(
                        "B2_APPLICATION_KEY must be set when using the remote storage backend"
                    ));
                }
                if self.part_size_bytes < MIN_REMOTE_PART_SIZE {
                    return Err(anyhow::anyhow!(
                        "UPLOAD_PART_SIZE_BYTES must be at least {} for the remote backend",
                        MIN_REMOTE_PART_SIZE
                    ));
                }
            }
            StorageBackend::Local => {
                let empty = self
                    .local_storage_path
                    .as_ref()
                    .map(|p| p.as_os_str().is_empty())
                    .unwrap_or(true);
                if empty {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using the local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn is_local(&self) -> bool {
        self.storage_backend == StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<ClientConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_remote_v3() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Remote);
        assert_eq!(config.api_version, ApiVersion::V3);
        assert_eq!(config.part_size_bytes, DEFAULT_PART_SIZE);
        assert_eq!(config.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
        assert!(!config.logging_enabled);
    }

    #[test]
    fn remote_requires_credentials() {
        let config = config_from(&[("B2_KEY_ID", "key-id")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("B2_APPLICATION_KEY"));

        let config =
            config_from(&[("B2_KEY_ID", "key-id"), ("B2_APPLICATION_KEY", "secret")]).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn remote_rejects_small_part_size() {
        let config = config_from(&[
            ("B2_KEY_ID", "key-id"),
            ("B2_APPLICATION_KEY", "secret"),
            ("UPLOAD_PART_SIZE_BYTES", "1024"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn local_backend_with_quota() {
        let config = config_from(&[
            ("STORAGE_BACKEND", "local"),
            ("LOCAL_STORAGE_PATH", "/tmp/blobkit"),
            ("LOCAL_STORAGE_QUOTA_BYTES", "2048"),
            ("UPLOAD_PART_SIZE_BYTES", "16"),
            ("STORAGE_LOGGING", "true"),
        ])
        .unwrap();

        assert!(config.is_local());
        assert_eq!(config.local_storage_quota_bytes, 2048);
        assert_eq!(config.part_size_bytes, 16);
        assert!(config.logging_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn local_backend_requires_path() {
        let config = config_from(&[("STORAGE_BACKEND", "local")]).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("LOCAL_STORAGE_PATH"));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(config_from(&[("STORAGE_BACKEND", "nfs")]).is_err());
        assert!(config_from(&[("B2_API_VERSION", "v9")]).is_err());
        assert!(config_from(&[("LOCAL_STORAGE_QUOTA_BYTES", "-1")]).is_err());
    }

    #[test]
    fn debug_hides_application_key() {
        let config =
            config_from(&[("B2_KEY_ID", "key-id"), ("B2_APPLICATION_KEY", "secret")]).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret"));
    }
}
