//! Large-file upload orchestration
//!
//! Splits a byte source into fixed-size parts and drives a
//! [`LargeFileStorage`] through start, per-part upload with retry, and
//! finish. Parts go out strictly in order, one at a time. Any unrecoverable
//! failure after start cancels the upload exactly once.

use std::time::{Duration, Instant};

use blobkit_core::constants::MAX_PART_ATTEMPTS;
use blobkit_core::{FinishedObject, PartRecord, StartedUpload};
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::checksum::sha1_hex;
use crate::traits::{LargeFileStorage, StorageError, StorageResult, UploadStage};

/// How many times a part is attempted and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per part, including the first. Values below 1 act as 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: MAX_PART_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

/// Drives multi-part uploads.
#[derive(Debug, Clone, Copy, Default)]
pub struct LargeFileUploader {
    policy: RetryPolicy,
}

impl LargeFileUploader {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Upload everything `source` yields as one object named `file_name`.
    ///
    /// The source is read `part_size` bytes at a time; the last part holds
    /// the remainder. An empty source is rejected before anything is started.
    pub async fn upload<S, R>(
        &self,
        storage: &S,
        file_name: &str,
        bucket_id: &str,
        source: &mut R,
        part_size: usize,
    ) -> StorageResult<FinishedObject>
    where
        S: LargeFileStorage + ?Sized,
        R: AsyncRead + Unpin + Send,
    {
        let minimum = storage.minimum_part_size();
        if part_size == 0 || part_size < minimum {
            return Err(StorageError::InvalidInput(format!(
                "part size {} is below the backend minimum of {} bytes",
                part_size, minimum
            )));
        }

        let start = Instant::now();
        let mut part = read_part(source, part_size)
            .await
            .map_err(|e| upload_failed(file_name, UploadStage::ReadSource, e))?;
        if part.is_empty() {
            return Err(StorageError::InvalidInput(format!(
                "nothing to upload for {}",
                file_name
            )));
        }

        let started = storage
            .start_large_file(file_name, bucket_id)
            .await
            .map_err(|e| upload_failed(file_name, UploadStage::Start, e))?;

        tracing::info!(
            file_id = %started.file_id,
            file_name = %file_name,
            part_size_bytes = part_size,
            "Large file upload started"
        );

        let mut parts: Vec<PartRecord> = Vec::new();
        loop {
            let part_number = parts.len() as u32 + 1;
            let size = part.len();

            let record = match self.send_part(storage, &started, part_number, part).await {
                Ok(record) => record,
                Err((attempts, e)) => {
                    let stage = UploadStage::Part {
                        part_number,
                        attempts,
                    };
                    return Err(self
                        .abort(storage, &started, file_name, stage, e)
                        .await);
                }
            };
            parts.push(record);

            if size < part_size {
                break;
            }
            part = match read_part(source, part_size).await {
                Ok(next) if next.is_empty() => break,
                Ok(next) => next,
                Err(e) => {
                    return Err(self
                        .abort(storage, &started, file_name, UploadStage::ReadSource, e)
                        .await);
                }
            };
        }

        let checksums: Vec<String> = parts.iter().map(|p| p.content_checksum.clone()).collect();
        let mut finished = match storage.finish_large_file(&started.file_id, &checksums).await {
            Ok(finished) => finished,
            Err(e) => {
                return Err(self
                    .abort(storage, &started, file_name, UploadStage::Finish, e)
                    .await);
            }
        };
        if finished.bucket_id.is_empty() {
            finished.bucket_id = started.bucket_id.clone();
        }

        tracing::info!(
            file_id = %finished.file_id,
            file_name = %file_name,
            parts = parts.len(),
            size_bytes = finished.content_length_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Large file upload finished"
        );

        Ok(finished)
    }

    /// Checksum a part once, then fetch a fresh target and transmit it until
    /// it succeeds or the attempts run out. Returns the attempt count with
    /// the last error.
    async fn send_part<S>(
        &self,
        storage: &S,
        started: &StartedUpload,
        part_number: u32,
        data: Bytes,
    ) -> Result<PartRecord, (u32, StorageError)>
    where
        S: LargeFileStorage + ?Sized,
    {
        let checksum = sha1_hex(&data);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match storage.get_upload_part_target(&started.file_id).await {
                Ok(target) => {
                    storage
                        .upload_part(&target, part_number, &checksum, data.clone())
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    return Ok(PartRecord {
                        part_number,
                        content_checksum: checksum,
                        size_bytes: data.len() as u64,
                    })
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        error = %e,
                        file_id = %started.file_id,
                        part_number = part_number,
                        attempt = attempt,
                        "Part upload failed, retrying"
                    );
                    if !self.policy.delay.is_zero() {
                        tokio::time::sleep(self.policy.delay).await;
                    }
                }
                Err(e) => return Err((attempt, e)),
            }
        }
    }

    /// Cancel after an unrecoverable failure and build the error to surface.
    async fn abort<S>(
        &self,
        storage: &S,
        started: &StartedUpload,
        file_name: &str,
        stage: UploadStage,
        cause: StorageError,
    ) -> StorageError
    where
        S: LargeFileStorage + ?Sized,
    {
        tracing::error!(
            error = %cause,
            file_id = %started.file_id,
            file_name = %file_name,
            stage = %stage,
            "Large file upload failed, cancelling"
        );

        if let Err(e) = storage.cancel_large_file(&started.file_id).await {
            tracing::error!(
                error = %e,
                file_id = %started.file_id,
                "Failed to cancel large file"
            );
        }

        upload_failed(file_name, stage, cause)
    }
}

/// Cancel an unfinished upload. `false` for an empty, unknown or finished id.
pub async fn cancel_large<S>(storage: &S, file_id: &str) -> bool
where
    S: LargeFileStorage + ?Sized,
{
    if file_id.is_empty() {
        return false;
    }

    match storage.cancel_large_file(file_id).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, file_id = %file_id, "Cancel large file failed");
            false
        }
    }
}

fn upload_failed(file_name: &str, stage: UploadStage, source: StorageError) -> StorageError {
    StorageError::UploadFailed {
        file_name: file_name.to_string(),
        stage,
        source: Box::new(source),
    }
}

/// Read up to `part_size` bytes; fewer only at the end of the source.
async fn read_part<R>(source: &mut R, part_size: usize) -> StorageResult<Bytes>
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = Vec::with_capacity(part_size);
    (&mut *source)
        .take(part_size as u64)
        .read_to_end(&mut buf)
        .await?;
    Ok(Bytes::from(buf))
}
