//! blobkit storage library
//!
//! Client for a B2-style object storage API with a local-directory stand-in.
//! It includes the `Storage` traits, the remote and local backends, and the
//! large-file upload orchestrator that drives either of them.
//!
//! # Large uploads
//!
//! A large upload is started once, sent as numbered parts of a fixed size
//! (the last one shorter), and finished with the ordered part checksums.
//! Each part gets a fresh upload target per attempt and at most three
//! attempts. If a part cannot be sent, the upload is cancelled and no later
//! part is attempted.

#[cfg(feature = "storage-remote")]
pub mod auth;
pub mod checksum;
pub mod factory;
pub mod handle;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-remote")]
pub mod remote;
pub mod traits;
#[cfg(feature = "storage-remote")]
pub mod transport;
pub mod upload;

// Re-export commonly used types
#[cfg(feature = "storage-remote")]
pub use auth::{AccountAuthorization, Authorizer};
pub use blobkit_core::StorageBackend;
pub use checksum::sha1_hex;
pub use factory::create_service;
pub use handle::{BackendLocation, ServiceHandle};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-remote")]
pub use remote::RemoteStorage;
pub use traits::{LargeFileStorage, Storage, StorageError, StorageResult, UploadStage};
#[cfg(feature = "storage-remote")]
pub use transport::{HttpClient, HttpRequest, HttpResponse, Transport, TransportConfig};
pub use upload::{cancel_large, LargeFileUploader, RetryPolicy};
