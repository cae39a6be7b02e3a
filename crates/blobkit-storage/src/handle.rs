//! Service handle
//!
//! A `ServiceHandle` is what callers hold after authorization or local
//! setup. It owns the resolved backend and routes every operation to it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use blobkit_core::{
    ApiVersion, FileDescriptor, FileList, FinishedObject, StorageBackend, UploadTarget,
};
use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::checksum::sha1_hex;
use crate::traits::{Storage, StorageError, StorageResult};
use crate::upload::{cancel_large, LargeFileUploader, RetryPolicy};

/// Where a handle's objects live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendLocation {
    Remote {
        api_base_url: String,
        auth_token: String,
    },
    Local {
        root_path: PathBuf,
        /// 0 means unlimited.
        storage_quota_bytes: u64,
    },
}

#[derive(Clone)]
pub struct ServiceHandle {
    storage: Arc<dyn Storage>,
    location: BackendLocation,
    api_version: ApiVersion,
    recommended_part_size: Option<usize>,
    uploader: LargeFileUploader,
    logging_enabled: bool,
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = match &self.location {
            BackendLocation::Remote { api_base_url, .. } => format!("remote {}", api_base_url),
            BackendLocation::Local { root_path, .. } => format!("local {}", root_path.display()),
        };
        f.debug_struct("ServiceHandle")
            .field("location", &location)
            .field("api_version", &self.api_version)
            .field("logging_enabled", &self.logging_enabled)
            .finish()
    }
}

impl ServiceHandle {
    /// Wrap an already-built backend.
    ///
    /// Remote locations need a non-empty URL and token, local ones a
    /// non-empty root. The location must describe the same kind of backend
    /// as `storage`.
    pub fn new(
        storage: Arc<dyn Storage>,
        location: BackendLocation,
        api_version: ApiVersion,
    ) -> StorageResult<Self> {
        let described = match &location {
            BackendLocation::Remote { .. } => StorageBackend::Remote,
            BackendLocation::Local { .. } => StorageBackend::Local,
        };
        if described != storage.backend_type() {
            return Err(StorageError::ConfigError(format!(
                "{} location given for a {} backend",
                described,
                storage.backend_type()
            )));
        }

        match &location {
            BackendLocation::Remote {
                api_base_url,
                auth_token,
            } if api_base_url.is_empty() || auth_token.is_empty() => {
                return Err(StorageError::ConfigError(
                    "remote handle needs an API URL and an authorization token".to_string(),
                ));
            }
            BackendLocation::Local { root_path, .. } if root_path.as_os_str().is_empty() => {
                return Err(StorageError::ConfigError(
                    "local handle needs a root path".to_string(),
                ));
            }
            _ => {}
        }

        Ok(ServiceHandle {
            storage,
            location,
            api_version,
            recommended_part_size: None,
            uploader: LargeFileUploader::default(),
            logging_enabled: false,
        })
    }

    /// Handle over a local directory, created if absent.
    #[cfg(feature = "storage-local")]
    pub async fn local(
        root_path: impl AsRef<std::path::Path>,
        storage_quota_bytes: u64,
    ) -> StorageResult<Self> {
        let storage =
            crate::local::LocalStorage::new(root_path.as_ref(), storage_quota_bytes).await?;
        let location = BackendLocation::Local {
            root_path: storage.root_path().to_path_buf(),
            storage_quota_bytes,
        };
        Self::new(Arc::new(storage), location, ApiVersion::default())
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.uploader = LargeFileUploader::new(policy);
        self
    }

    pub fn with_recommended_part_size(mut self, part_size: usize) -> Self {
        self.recommended_part_size = (part_size > 0).then_some(part_size);
        self
    }

    /// Toggle the per-call debug event. The only mutable state of a handle.
    pub fn set_logging(&mut self, enabled: bool) {
        self.logging_enabled = enabled;
    }

    pub fn logging_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub fn location(&self) -> &BackendLocation {
        &self.location
    }

    pub fn is_local(&self) -> bool {
        matches!(self.location, BackendLocation::Local { .. })
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn backend_type(&self) -> StorageBackend {
        self.storage.backend_type()
    }

    pub fn minimum_part_size(&self) -> usize {
        self.storage.minimum_part_size()
    }

    /// Part size suggested by the service, falling back to its minimum.
    pub fn recommended_part_size(&self) -> usize {
        self.recommended_part_size
            .unwrap_or_else(|| self.storage.minimum_part_size())
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    fn trace_call(&self, operation: &str, start: Instant, success: bool) {
        if !self.logging_enabled {
            return;
        }
        tracing::debug!(
            operation = %operation,
            backend = %self.storage.backend_type(),
            success = success,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage call"
        );
    }

    /// Upload `source` as a multi-part object.
    pub async fn upload_large<R>(
        &self,
        file_name: &str,
        bucket_id: &str,
        source: &mut R,
        part_size: usize,
    ) -> StorageResult<FinishedObject>
    where
        R: AsyncRead + Unpin + Send,
    {
        let start = Instant::now();
        let result = self
            .uploader
            .upload(self.storage.as_ref(), file_name, bucket_id, source, part_size)
            .await;
        self.trace_call("upload_large", start, result.is_ok());
        result
    }

    /// Cancel an unfinished multi-part object; `false` if there was nothing to cancel.
    pub async fn cancel_large(&self, file_id: &str) -> bool {
        let start = Instant::now();
        let cancelled = cancel_large(self.storage.as_ref(), file_id).await;
        self.trace_call("cancel_large", start, cancelled);
        cancelled
    }

    pub async fn get_upload_url(&self, bucket_id: &str) -> StorageResult<UploadTarget> {
        let start = Instant::now();
        let result = self.storage.get_upload_url(bucket_id).await;
        self.trace_call("get_upload_url", start, result.is_ok());
        result
    }

    /// Upload a whole file in one request; the checksum is computed here.
    pub async fn upload_file(
        &self,
        target: &UploadTarget,
        file_name: &str,
        data: Bytes,
    ) -> StorageResult<FileDescriptor> {
        let start = Instant::now();
        let checksum = sha1_hex(&data);
        let result = self
            .storage
            .upload_file(target, file_name, &checksum, data)
            .await;
        self.trace_call("upload_file", start, result.is_ok());
        result
    }

    pub async fn download_file(&self, file_id: &str) -> StorageResult<Bytes> {
        let start = Instant::now();
        let result = self.storage.download_file(file_id).await;
        self.trace_call("download_file", start, result.is_ok());
        result
    }

    /// Bytes `begin..=end` of a file.
    pub async fn download_file_range(
        &self,
        file_id: &str,
        begin: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        let start = Instant::now();
        let result = self.storage.download_file_range(file_id, begin, end).await;
        self.trace_call("download_file_range", start, result.is_ok());
        result
    }

    pub async fn list_files(
        &self,
        bucket_id: &str,
        max_count: u32,
        start_file_name: Option<&str>,
        start_file_id: Option<&str>,
    ) -> StorageResult<FileList> {
        let start = Instant::now();
        let result = self
            .storage
            .list_files(bucket_id, max_count, start_file_name, start_file_id)
            .await;
        self.trace_call("list_files", start, result.is_ok());
        result
    }

    pub async fn delete_file(&self, file_id: &str, file_name: &str) -> StorageResult<()> {
        let start = Instant::now();
        let result = self.storage.delete_file(file_id, file_name).await;
        self.trace_call("delete_file", start, result.is_ok());
        result
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn local_handle_creates_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("bucket");

        let handle = ServiceHandle::local(&root, 1024).await.unwrap();

        assert!(root.is_dir());
        assert!(handle.is_local());
        assert_eq!(handle.backend_type(), StorageBackend::Local);
        assert_eq!(
            handle.location(),
            &BackendLocation::Local {
                root_path: root.clone(),
                storage_quota_bytes: 1024
            }
        );
    }

    #[tokio::test]
    async fn logging_flag_is_mutable() {
        let dir = tempdir().unwrap();
        let mut handle = ServiceHandle::local(dir.path(), 0).await.unwrap();
        assert!(!handle.logging_enabled());

        handle.set_logging(true);
        assert!(handle.logging_enabled());

        let target = handle.get_upload_url("bucket").await.unwrap();
        handle
            .upload_file(&target, "logged.txt", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert_eq!(&handle.download_file("logged.txt").await.unwrap()[..], b"data");
    }

    #[tokio::test]
    async fn location_must_match_backend() {
        let dir = tempdir().unwrap();
        let storage = crate::local::LocalStorage::new(dir.path(), 0).await.unwrap();
        let err = ServiceHandle::new(
            Arc::new(storage),
            BackendLocation::Remote {
                api_base_url: "https://api001.example".into(),
                auth_token: "4_0022623512fc8f80000000001_tok".into(),
            },
            ApiVersion::V3,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
        assert!(err.to_string().contains("remote location given for a local backend"));
    }

    #[tokio::test]
    async fn local_location_requires_root() {
        let dir = tempdir().unwrap();
        let storage = crate::local::LocalStorage::new(dir.path(), 0).await.unwrap();
        let err = ServiceHandle::new(
            Arc::new(storage),
            BackendLocation::Local {
                root_path: PathBuf::new(),
                storage_quota_bytes: 0,
            },
            ApiVersion::V3,
        )
        .unwrap_err();
        assert!(matches!(err, StorageError::ConfigError(_)));
    }

    #[tokio::test]
    async fn cancel_through_handle() {
        let dir = tempdir().unwrap();
        let handle = ServiceHandle::local(dir.path(), 0).await.unwrap();

        handle
            .storage()
            .start_large_file("pending.bin", "")
            .await
            .unwrap();
        assert!(handle.cancel_large("pending.bin").await);
        assert!(!handle.cancel_large("pending.bin").await);
        assert!(!handle.cancel_large("").await);
    }

    #[tokio::test]
    async fn recommended_part_size_falls_back_to_minimum() {
        let dir = tempdir().unwrap();
        let handle = ServiceHandle::local(dir.path(), 0).await.unwrap();
        assert_eq!(handle.recommended_part_size(), 1);

        let handle = handle.with_recommended_part_size(4096);
        assert_eq!(handle.recommended_part_size(), 4096);
    }
}
