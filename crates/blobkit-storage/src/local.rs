use crate::traits::{LargeFileStorage, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use blobkit_core::constants::DEFAULT_LIST_COUNT;
use blobkit_core::{
    FileDescriptor, FileList, FileListItem, FinishedObject, PartUploadTarget, StartedUpload,
    StorageBackend, UploadTarget,
};
use bytes::Bytes;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Local filesystem storage implementation
///
/// The root directory plays the role of a bucket: every object is one file
/// directly under it, and the object's id is its file name.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_path: PathBuf,
    storage_quota_bytes: u64,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `root_path` - Directory holding the objects, created if absent
    /// * `storage_quota_bytes` - Upper bound on the directory size, 0 for unlimited
    pub async fn new(
        root_path: impl Into<PathBuf>,
        storage_quota_bytes: u64,
    ) -> StorageResult<Self> {
        let root_path = root_path.into();

        if root_path.as_os_str().is_empty() {
            return Err(StorageError::ConfigError(
                "Local storage path is empty".to_string(),
            ));
        }

        fs::create_dir_all(&root_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            root_path,
            storage_quota_bytes,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn storage_quota_bytes(&self) -> u64 {
        self.storage_quota_bytes
    }

    /// Convert an object name to its path under the root.
    ///
    /// Names are flat: separators and `..` would let a name escape the root.
    fn name_to_path(&self, name: &str) -> StorageResult<PathBuf> {
        if name.is_empty() {
            return Err(StorageError::InvalidInput("file name is empty".to_string()));
        }
        if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0')
        {
            return Err(StorageError::InvalidInput(format!(
                "file name {:?} contains invalid characters",
                name
            )));
        }

        Ok(self.root_path.join(name))
    }

    /// Fail with `QuotaExceeded` if writing `requested` more bytes would push
    /// the directory past the quota.
    async fn check_quota(&self, requested: u64) -> StorageResult<()> {
        if self.storage_quota_bytes == 0 {
            return Ok(());
        }

        let used = directory_size(&self.root_path).await?;
        if used.saturating_add(requested) > self.storage_quota_bytes {
            tracing::error!(
                path = %self.root_path.display(),
                used_bytes = used,
                requested_bytes = requested,
                quota_bytes = self.storage_quota_bytes,
                "Local storage quota exceeded"
            );
            return Err(StorageError::QuotaExceeded {
                used,
                requested,
                quota: self.storage_quota_bytes,
            });
        }

        Ok(())
    }
}

/// Total size of every regular file below `root`, recursively.
async fn directory_size(root: &Path) -> StorageResult<u64> {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                total += entry.metadata().await?.len();
            }
        }
    }

    Ok(total)
}

fn not_found_or_io(name: &str, e: std::io::Error) -> StorageError {
    if e.kind() == ErrorKind::NotFound {
        StorageError::NotFound(name.to_string())
    } else {
        StorageError::IoError(e)
    }
}

fn millis_since_epoch(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[async_trait]
impl LargeFileStorage for LocalStorage {
    fn minimum_part_size(&self) -> usize {
        1
    }

    async fn start_large_file(
        &self,
        file_name: &str,
        bucket_id: &str,
    ) -> StorageResult<StartedUpload> {
        let path = self.name_to_path(file_name)?;

        fs::File::create(&path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "Failed to create local large file");
            StorageError::IoError(e)
        })?;

        tracing::debug!(
            path = %path.display(),
            file_name = %file_name,
            "Local large file started"
        );

        Ok(StartedUpload {
            file_id: file_name.to_string(),
            file_name: file_name.to_string(),
            bucket_id: bucket_id.to_string(),
        })
    }

    async fn get_upload_part_target(&self, file_id: &str) -> StorageResult<PartUploadTarget> {
        let path = self.name_to_path(file_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(file_id.to_string()));
        }

        Ok(PartUploadTarget {
            file_id: file_id.to_string(),
            upload_url: self.root_path.display().to_string(),
            authorization_token: None,
            is_local: true,
            storage_quota_bytes: self.storage_quota_bytes,
        })
    }

    async fn upload_part(
        &self,
        target: &PartUploadTarget,
        part_number: u32,
        _checksum: &str,
        data: Bytes,
    ) -> StorageResult<()> {
        let path = self.name_to_path(&target.file_id)?;
        let size = data.len();
        let start = Instant::now();

        self.check_quota(size as u64).await?;

        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(|e| not_found_or_io(&target.file_id, e))?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!(
            path = %path.display(),
            part_number = part_number,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local part upload successful"
        );

        Ok(())
    }

    async fn finish_large_file(
        &self,
        file_id: &str,
        _part_checksums: &[String],
    ) -> StorageResult<FinishedObject> {
        let path = self.name_to_path(file_id)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| not_found_or_io(file_id, e))?;

        Ok(FinishedObject {
            file_id: file_id.to_string(),
            file_name: file_id.to_string(),
            bucket_id: String::new(),
            content_length_bytes: meta.len(),
        })
    }

    async fn cancel_large_file(&self, file_id: &str) -> StorageResult<()> {
        let path = self.name_to_path(file_id)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(file_id, e))?;

        tracing::debug!(path = %path.display(), "Local large file cancelled");
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn get_upload_url(&self, bucket_id: &str) -> StorageResult<UploadTarget> {
        Ok(UploadTarget {
            bucket_id: bucket_id.to_string(),
            upload_url: self.root_path.display().to_string(),
            authorization_token: None,
            is_local: true,
            storage_quota_bytes: self.storage_quota_bytes,
        })
    }

    async fn upload_file(
        &self,
        target: &UploadTarget,
        file_name: &str,
        checksum: &str,
        data: Bytes,
    ) -> StorageResult<FileDescriptor> {
        let path = self.name_to_path(file_name)?;
        let size = data.len();
        let start = Instant::now();

        self.check_quota(size as u64).await?;

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        tracing::info!(
            path = %path.display(),
            file_name = %file_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(FileDescriptor {
            file_id: file_name.to_string(),
            file_name: file_name.to_string(),
            bucket_id: target.bucket_id.clone(),
            content_length: size as u64,
            content_sha1: Some(checksum.to_string()),
            content_type: Some("application/octet-stream".to_string()),
            upload_timestamp: millis_since_epoch(SystemTime::now()),
        })
    }

    async fn download_file(&self, file_id: &str) -> StorageResult<Bytes> {
        let path = self.name_to_path(file_id)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| not_found_or_io(file_id, e))?;
        Ok(Bytes::from(data))
    }

    async fn download_file_range(
        &self,
        file_id: &str,
        begin: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        let path = self.name_to_path(file_id)?;
        if end < begin {
            return Err(StorageError::InvalidInput(format!(
                "range end {} is before begin {}",
                end, begin
            )));
        }

        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(file_id, e))?;
        let size = file.metadata().await?.len();
        if end >= size {
            return Err(StorageError::InvalidInput(format!(
                "range {}-{} is past the end of a {} byte file",
                begin, end, size
            )));
        }

        let len = end - begin + 1;
        let mut buf = Vec::with_capacity(len as usize);

        file.seek(SeekFrom::Start(begin)).await?;
        file.take(len).read_to_end(&mut buf).await?;

        Ok(Bytes::from(buf))
    }

    async fn list_files(
        &self,
        bucket_id: &str,
        max_count: u32,
        start_file_name: Option<&str>,
        start_file_id: Option<&str>,
    ) -> StorageResult<FileList> {
        let max_count = match max_count {
            0 => DEFAULT_LIST_COUNT as usize,
            n => n as usize,
        };
        // ids and names coincide locally
        let cursor = start_file_name
            .or(start_file_id)
            .filter(|s| !s.is_empty());

        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.root_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if cursor.is_some_and(|c| name.as_str() < c) {
                continue;
            }
            let modified = meta.modified().map(millis_since_epoch).unwrap_or_default();
            entries.push((name, meta.len(), modified));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let next = entries.get(max_count).map(|(name, _, _)| name.clone());
        let files = entries
            .into_iter()
            .take(max_count)
            .map(|(name, len, modified)| FileListItem {
                file_id: name.clone(),
                file_name: name,
                bucket_id: bucket_id.to_string(),
                content_length: len,
                content_sha1: None,
                action: Some("upload".to_string()),
                upload_timestamp: modified,
            })
            .collect();

        Ok(FileList {
            files,
            next_file_id: next.clone(),
            next_file_name: next,
        })
    }

    async fn delete_file(&self, file_id: &str, _file_name: &str) -> StorageResult<()> {
        let path = self.name_to_path(file_id)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(file_id, e))?;

        tracing::info!(
            path = %path.display(),
            file_id = %file_id,
            "Local storage delete successful"
        );

        Ok(())
    }
}
