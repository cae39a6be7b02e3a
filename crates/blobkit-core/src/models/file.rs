//! Models for single-shot uploads and listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Destination for a single-request (non-chunked) upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    #[serde(default)]
    pub bucket_id: String,
    /// Upload URL for remote targets, directory path for local ones.
    pub upload_url: String,
    #[serde(default)]
    pub authorization_token: Option<String>,
    #[serde(skip)]
    pub is_local: bool,
    #[serde(skip)]
    pub storage_quota_bytes: u64,
}

/// A stored file, as returned by a single-shot upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub bucket_id: String,
    #[serde(default)]
    pub content_length: u64,
    #[serde(default)]
    pub content_sha1: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub upload_timestamp: i64,
}

impl FileDescriptor {
    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        uploaded_at(self.upload_timestamp)
    }
}

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListItem {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub bucket_id: String,
    #[serde(default)]
    pub content_length: u64,
    #[serde(default)]
    pub content_sha1: Option<String>,
    /// `upload`, `start`, `hide` or `folder`.
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub upload_timestamp: i64,
}

impl FileListItem {
    /// SHA-1 of the content. Large files report the literal `"none"`, which
    /// is mapped to `None`.
    pub fn sha1(&self) -> Option<&str> {
        match self.content_sha1.as_deref() {
            Some("none") | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        uploaded_at(self.upload_timestamp)
    }
}

/// A page of listed files plus the cursor for the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<FileListItem>,
    #[serde(default)]
    pub next_file_name: Option<String>,
    #[serde(default)]
    pub next_file_id: Option<String>,
}

impl FileList {
    pub fn has_more(&self) -> bool {
        self.next_file_name.is_some()
    }
}

fn uploaded_at(millis: i64) -> Option<DateTime<Utc>> {
    if millis <= 0 {
        return None;
    }
    DateTime::from_timestamp_millis(millis)
}
