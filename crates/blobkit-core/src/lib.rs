//! blobkit core library
//!
//! This crate provides the configuration, backend selectors and domain models
//! shared by the storage client and the CLI.

pub mod config;
pub mod constants;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::ClientConfig;
pub use models::{
    FileDescriptor, FileList, FileListItem, FinishedObject, PartRecord, PartUploadTarget,
    StartedUpload, UploadTarget,
};
// Note: Storage, StorageError, StorageResult live in the blobkit-storage crate
pub use storage_types::{ApiVersion, StorageBackend};
