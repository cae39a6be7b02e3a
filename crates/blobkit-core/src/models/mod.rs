//! Data models for the storage client
//!
//! Wire responses decode straight into these types (`camelCase` field names),
//! so the remote backend needs no parallel set of response structs. Fields
//! that only exist locally (`is_local`, quotas) are skipped on the wire.

mod file;
mod large_file;

// Re-export all models for convenient imports
pub use file::{FileDescriptor, FileList, FileListItem, UploadTarget};
pub use large_file::{FinishedObject, PartRecord, PartUploadTarget, StartedUpload};
