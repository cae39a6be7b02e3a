//! Storage abstraction traits
//!
//! `LargeFileStorage` is the capability set the upload orchestrator drives;
//! `Storage` adds the single-call operations. Both the remote and the local
//! backend implement the two traits, and a `ServiceHandle` stores whichever
//! one it was built with.

use std::fmt::{Display, Formatter, Result as FmtResult};

use async_trait::async_trait;
use blobkit_core::{
    FileDescriptor, FileList, FinishedObject, PartUploadTarget, StartedUpload, StorageBackend,
    UploadTarget,
};
use bytes::Bytes;
use thiserror::Error;

/// Step of a large upload at which it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Start,
    ReadSource,
    Part { part_number: u32, attempts: u32 },
    Finish,
}

impl Display for UploadStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStage::Start => write!(f, "start"),
            UploadStage::ReadSource => write!(f, "source read"),
            UploadStage::Part {
                part_number,
                attempts,
            } => write!(f, "part {} after {} attempt(s)", part_number, attempts),
            UploadStage::Finish => write!(f, "finish"),
        }
    }
}

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Backend rejected request ({status} {code}): {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Checksum rejected by backend: {0}")]
    IntegrityMismatch(String),

    #[error("Storage quota exceeded: {used} bytes used, {requested} bytes requested, {quota} bytes allowed")]
    QuotaExceeded { used: u64, requested: u64, quota: u64 },

    /// A local object that does not exist. Remote 404s are `Rejected`.
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Upload of {file_name} failed during {stage}: {source}")]
    UploadFailed {
        file_name: String,
        stage: UploadStage,
        #[source]
        source: Box<StorageError>,
    },
}

impl StorageError {
    /// Whether a part transmission that failed with this error may be retried.
    ///
    /// Every non-2xx response and every undecodable response body counts.
    /// Quota failures are retried like any other rejection even though the
    /// condition does not clear between attempts.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Transport(_)
            | StorageError::Timeout(_)
            | StorageError::Rejected { .. }
            | StorageError::IntegrityMismatch(_)
            | StorageError::QuotaExceeded { .. }
            | StorageError::InvalidResponse(_)
            | StorageError::IoError(_) => true,
            StorageError::NotFound(_)
            | StorageError::InvalidInput(_)
            | StorageError::ConfigError(_)
            | StorageError::UploadFailed { .. } => false,
        }
    }

    /// Failure before a response was obtained (network, timeout, filesystem).
    pub fn is_transport(&self) -> bool {
        match self {
            StorageError::Transport(_) | StorageError::Timeout(_) | StorageError::IoError(_) => {
                true
            }
            StorageError::UploadFailed { source, .. } => source.is_transport(),
            _ => false,
        }
    }

    /// Failure reported by the backend itself.
    pub fn is_rejection(&self) -> bool {
        match self {
            StorageError::Rejected { .. }
            | StorageError::IntegrityMismatch(_)
            | StorageError::QuotaExceeded { .. }
            | StorageError::NotFound(_) => true,
            StorageError::UploadFailed { source, .. } => source.is_rejection(),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Multi-part upload capability set.
///
/// The orchestrator depends only on this trait, never on backend identity.
#[async_trait]
pub trait LargeFileStorage: Send + Sync {
    /// Smallest part size (in bytes) the backend accepts for non-final parts.
    fn minimum_part_size(&self) -> usize;

    /// Begin a multi-part object. The returned `file_id` identifies it for
    /// every following call.
    async fn start_large_file(&self, file_name: &str, bucket_id: &str)
        -> StorageResult<StartedUpload>;

    /// Obtain a destination for one part transmission attempt.
    async fn get_upload_part_target(&self, file_id: &str) -> StorageResult<PartUploadTarget>;

    /// Transmit one part. `part_number` is 1-based; `checksum` is the
    /// lowercase hex SHA-1 of `data`.
    async fn upload_part(
        &self,
        target: &PartUploadTarget,
        part_number: u32,
        checksum: &str,
        data: Bytes,
    ) -> StorageResult<()>;

    /// Assemble the stored parts in the order of `part_checksums`.
    async fn finish_large_file(
        &self,
        file_id: &str,
        part_checksums: &[String],
    ) -> StorageResult<FinishedObject>;

    /// Discard every stored part of an unfinished object.
    async fn cancel_large_file(&self, file_id: &str) -> StorageResult<()>;
}

/// Full storage interface: large files plus the single-call operations.
#[async_trait]
pub trait Storage: LargeFileStorage {
    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Get a destination for a single-request upload into `bucket_id`.
    async fn get_upload_url(&self, bucket_id: &str) -> StorageResult<UploadTarget>;

    /// Upload a whole file in one request. Never retried.
    async fn upload_file(
        &self,
        target: &UploadTarget,
        file_name: &str,
        checksum: &str,
        data: Bytes,
    ) -> StorageResult<FileDescriptor>;

    /// Download a whole file by id.
    async fn download_file(&self, file_id: &str) -> StorageResult<Bytes>;

    /// Download bytes `begin..=end` (inclusive on both ends) of a file.
    async fn download_file_range(&self, file_id: &str, begin: u64, end: u64)
        -> StorageResult<Bytes>;

    /// List up to `max_count` files, starting at the optional cursor.
    async fn list_files(
        &self,
        bucket_id: &str,
        max_count: u32,
        start_file_name: Option<&str>,
        start_file_id: Option<&str>,
    ) -> StorageResult<FileList>;

    /// Delete one file version.
    async fn delete_file(&self, file_id: &str, file_name: &str) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(StorageError::Timeout("slow".into()).is_retryable());
        assert!(StorageError::QuotaExceeded {
            used: 10,
            requested: 5,
            quota: 12
        }
        .is_retryable());
        assert!(StorageError::InvalidResponse("bad json".into()).is_retryable());
        assert!(StorageError::Rejected {
            status: 404,
            code: "not_found".into(),
            message: "upload pod gone".into()
        }
        .is_retryable());
        assert!(!StorageError::InvalidInput("empty id".into()).is_retryable());
        assert!(!StorageError::NotFound("large-file.txt".into()).is_retryable());
    }

    #[test]
    fn upload_failure_keeps_cause_classification() {
        let err = StorageError::UploadFailed {
            file_name: "large-file.txt".into(),
            stage: UploadStage::Part {
                part_number: 1,
                attempts: 3,
            },
            source: Box::new(StorageError::Transport("connection reset".into())),
        };

        assert!(err.is_transport());
        assert!(!err.is_rejection());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("part 1 after 3 attempt(s)"));
    }
}
