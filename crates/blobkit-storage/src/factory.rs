use crate::handle::ServiceHandle;
use crate::{StorageBackend, StorageError, StorageResult};
use blobkit_core::ClientConfig;

/// Create a service handle based on configuration
///
/// Remote backends are authorized against `config.auth_url`; local backends
/// get their directory created.
pub async fn create_service(config: &ClientConfig) -> StorageResult<ServiceHandle> {
    let mut handle = match config.storage_backend {
        #[cfg(feature = "storage-remote")]
        StorageBackend::Remote => {
            use crate::auth::Authorizer;
            use crate::transport::{Transport, TransportConfig};

            let key_id = config
                .key_id
                .as_deref()
                .ok_or_else(|| StorageError::ConfigError("B2_KEY_ID not configured".to_string()))?;
            let application_key = config.application_key.as_deref().ok_or_else(|| {
                StorageError::ConfigError("B2_APPLICATION_KEY not configured".to_string())
            })?;

            let transport = Transport::new(&TransportConfig::from(config))?;
            let (handle, _) = Authorizer::new(transport)
                .with_auth_url(config.auth_url.as_str())
                .authorize(key_id, application_key, config.api_version)
                .await?;
            handle
        }

        #[cfg(not(feature = "storage-remote"))]
        StorageBackend::Remote => {
            return Err(StorageError::ConfigError(
                "Remote storage backend not available (storage-remote feature not enabled)"
                    .to_string(),
            ))
        }

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let root_path = config.local_storage_path.as_ref().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            ServiceHandle::local(root_path, config.local_storage_quota_bytes).await?
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => {
            return Err(StorageError::ConfigError(
                "Local storage backend not available (storage-local feature not enabled)"
                    .to_string(),
            ))
        }
    };

    handle.set_logging(config.logging_enabled);
    Ok(handle)
}

/// Create a service handle for testing (uses local storage)
#[cfg(all(test, feature = "storage-local"))]
pub async fn create_test_service(root: &std::path::Path) -> StorageResult<ServiceHandle> {
    let config = ClientConfig {
        storage_backend: StorageBackend::Local,
        local_storage_path: Some(root.to_path_buf()),
        ..ClientConfig::default()
    };
    create_service(&config).await
}
