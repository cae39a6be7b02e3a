//! Large-file (multi-part) upload models.

use serde::{Deserialize, Serialize};

/// An in-progress multi-part object, returned when a large file is started.
///
/// `file_id` is assigned by the remote service and must be treated as opaque.
/// The local backend synthesizes it from the requested file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedUpload {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub bucket_id: String,
}

/// Destination and credential for transmitting one part.
///
/// A target is only guaranteed valid for a single attempt; fetch a new one
/// before every retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartUploadTarget {
    pub file_id: String,
    /// Upload URL for remote targets, directory path for local ones.
    pub upload_url: String,
    #[serde(default)]
    pub authorization_token: Option<String>,
    #[serde(skip)]
    pub is_local: bool,
    /// 0 means unlimited. Only enforced by the local backend.
    #[serde(skip)]
    pub storage_quota_bytes: u64,
}

/// Bookkeeping for one part accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartRecord {
    /// 1-based, strictly increasing, no gaps.
    pub part_number: u32,
    /// Lowercase hex SHA-1 of the exact part bytes.
    pub content_checksum: String,
    pub size_bytes: u64,
}

/// The object produced by finishing a large file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishedObject {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub bucket_id: String,
    #[serde(rename = "contentLength", default)]
    pub content_length_bytes: u64,
}
