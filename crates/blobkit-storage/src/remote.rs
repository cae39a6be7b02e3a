use crate::transport::Transport;
use crate::traits::{LargeFileStorage, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use blobkit_core::constants::{API_PREFIX, AUTO_CONTENT_TYPE, MIN_REMOTE_PART_SIZE};
use blobkit_core::{
    ApiVersion, FileDescriptor, FileList, FinishedObject, PartUploadTarget, StartedUpload,
    StorageBackend, UploadTarget,
};
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use http::{HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Instant;

const START_LARGE_FILE: &str = "b2_start_large_file";
const GET_UPLOAD_PART_URL: &str = "b2_get_upload_part_url";
const FINISH_LARGE_FILE: &str = "b2_finish_large_file";
const CANCEL_LARGE_FILE: &str = "b2_cancel_large_file";
const GET_UPLOAD_URL: &str = "b2_get_upload_url";
const DOWNLOAD_FILE_BY_ID: &str = "b2_download_file_by_id";
const LIST_FILE_VERSIONS: &str = "b2_list_file_versions";
const DELETE_FILE_VERSION: &str = "b2_delete_file_version";

const PART_NUMBER_HEADER: &str = "x-bz-part-number";
const CONTENT_SHA1_HEADER: &str = "x-bz-content-sha1";
const FILE_NAME_HEADER: &str = "x-bz-file-name";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartLargeFileRequest<'a> {
    bucket_id: &'a str,
    file_name: &'a str,
    content_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FinishLargeFileRequest<'a> {
    file_id: &'a str,
    part_sha1_array: &'a [String],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileIdRequest<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFileVersionRequest<'a> {
    file_id: &'a str,
    file_name: &'a str,
}

/// Remote storage implementation over the `b2api` HTTP API
#[derive(Clone)]
pub struct RemoteStorage {
    transport: Transport,
    api_url: String,
    auth_token: String,
    api_version: ApiVersion,
    minimum_part_size: usize,
}

impl std::fmt::Debug for RemoteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStorage")
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("minimum_part_size", &self.minimum_part_size)
            .finish()
    }
}

impl RemoteStorage {
    /// Create a new RemoteStorage instance
    ///
    /// # Arguments
    /// * `transport` - Transport adapter every call goes through
    /// * `api_url` - API base URL returned by authorization (e.g. "https://api001.backblazeb2.com")
    /// * `auth_token` - Account authorization token
    /// * `api_version` - API version used in endpoint paths
    pub fn new(
        transport: Transport,
        api_url: impl Into<String>,
        auth_token: impl Into<String>,
        api_version: ApiVersion,
    ) -> StorageResult<Self> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let auth_token = auth_token.into();

        if api_url.is_empty() {
            return Err(StorageError::ConfigError("API URL is empty".to_string()));
        }
        if auth_token.is_empty() {
            return Err(StorageError::ConfigError(
                "Authorization token is empty".to_string(),
            ));
        }

        Ok(RemoteStorage {
            transport,
            api_url,
            auth_token,
            api_version,
            minimum_part_size: MIN_REMOTE_PART_SIZE,
        })
    }

    /// Override the minimum part size (authorization reports the account's value).
    pub fn with_minimum_part_size(mut self, minimum_part_size: usize) -> Self {
        self.minimum_part_size = minimum_part_size.max(1);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// `{api_url}/b2api/{version}/{endpoint}`
    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.api_url, API_PREFIX, self.api_version, endpoint
        )
    }

    fn endpoint_url_with_query(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> StorageResult<String> {
        let url = reqwest::Url::parse_with_params(&self.endpoint_url(endpoint), query)
            .map_err(|e| StorageError::InvalidInput(format!("Invalid request URL: {}", e)))?;
        Ok(url.into())
    }

    fn auth_headers(&self, token: &str) -> StorageResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, header_value(token)?);
        Ok(headers)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> StorageResult<T> {
        let url = self.endpoint_url_with_query(endpoint, query)?;
        let headers = self.auth_headers(&self.auth_token)?;
        let start = Instant::now();

        let response = self
            .transport
            .send(Method::GET, &url, headers, Bytes::new())
            .await
            .inspect_err(|e| log_failure("GET", endpoint, start, e))?;

        response.json()
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> StorageResult<T> {
        let response = self.post(endpoint, body).await?;
        response.json()
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> StorageResult<crate::transport::HttpResponse> {
        let url = self.endpoint_url(endpoint);
        let mut headers = self.auth_headers(&self.auth_token)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let payload = serde_json::to_vec(body).map_err(|e| {
            StorageError::InvalidInput(format!("Failed to encode request body: {}", e))
        })?;
        let start = Instant::now();

        self.transport
            .send(Method::POST, &url, headers, Bytes::from(payload))
            .await
            .inspect_err(|e| log_failure("POST", endpoint, start, e))
    }

    async fn download(&self, file_id: &str, range: Option<(u64, u64)>) -> StorageResult<Bytes> {
        let url = self.endpoint_url_with_query(DOWNLOAD_FILE_BY_ID, &[("fileId", file_id)])?;
        let mut headers = self.auth_headers(&self.auth_token)?;
        if let Some((begin, end)) = range {
            headers.insert(RANGE, header_value(&format!("bytes={}-{}", begin, end))?);
        }
        let start = Instant::now();

        let response = self
            .transport
            .send(Method::GET, &url, headers, Bytes::new())
            .await
            .inspect_err(|e| log_failure("GET", DOWNLOAD_FILE_BY_ID, start, e))?;

        tracing::debug!(
            file_id = %file_id,
            size_bytes = response.body.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote download successful"
        );

        Ok(response.body)
    }
}

fn header_value(value: &str) -> StorageResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| StorageError::InvalidInput(format!("Invalid header value: {}", e)))
}

fn require_file_id(file_id: &str) -> StorageResult<()> {
    if file_id.is_empty() {
        return Err(StorageError::InvalidInput("file id is empty".to_string()));
    }
    Ok(())
}

fn log_failure(method: &str, endpoint: &str, start: Instant, error: &StorageError) {
    tracing::error!(
        error = %error,
        method = %method,
        endpoint = %endpoint,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Remote storage request failed"
    );
}

#[async_trait]
impl LargeFileStorage for RemoteStorage {
    fn minimum_part_size(&self) -> usize {
        self.minimum_part_size
    }

    async fn start_large_file(
        &self,
        file_name: &str,
        bucket_id: &str,
    ) -> StorageResult<StartedUpload> {
        let request = StartLargeFileRequest {
            bucket_id,
            file_name,
            content_type: AUTO_CONTENT_TYPE,
        };
        let started: StartedUpload = self.post_json(START_LARGE_FILE, &request).await?;

        tracing::debug!(
            file_id = %started.file_id,
            file_name = %file_name,
            bucket_id = %bucket_id,
            "Remote large file started"
        );

        Ok(started)
    }

    async fn get_upload_part_target(&self, file_id: &str) -> StorageResult<PartUploadTarget> {
        require_file_id(file_id)?;
        let target: PartUploadTarget = self
            .get_json(GET_UPLOAD_PART_URL, &[("fileId", file_id)])
            .await?;

        if target.upload_url.is_empty() {
            return Err(StorageError::InvalidResponse(
                "upload part URL missing from response".to_string(),
            ));
        }

        Ok(target)
    }

    async fn upload_part(
        &self,
        target: &PartUploadTarget,
        part_number: u32,
        checksum: &str,
        data: Bytes,
    ) -> StorageResult<()> {
        let token = target.authorization_token.as_deref().ok_or_else(|| {
            StorageError::InvalidInput("part target has no authorization token".to_string())
        })?;
        let size = data.len();

        let mut headers = self.auth_headers(token)?;
        headers.insert(PART_NUMBER_HEADER, HeaderValue::from(part_number));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        headers.insert(CONTENT_SHA1_HEADER, header_value(checksum)?);

        let start = Instant::now();
        self.transport
            .send(Method::POST, &target.upload_url, headers, data)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    file_id = %target.file_id,
                    part_number = part_number,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote part upload failed"
                );
            })?;

        tracing::debug!(
            file_id = %target.file_id,
            part_number = part_number,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote part upload successful"
        );

        Ok(())
    }

    async fn finish_large_file(
        &self,
        file_id: &str,
        part_checksums: &[String],
    ) -> StorageResult<FinishedObject> {
        require_file_id(file_id)?;
        let request = FinishLargeFileRequest {
            file_id,
            part_sha1_array: part_checksums,
        };
        self.post_json(FINISH_LARGE_FILE, &request).await
    }

    async fn cancel_large_file(&self, file_id: &str) -> StorageResult<()> {
        require_file_id(file_id)?;
        self.post(CANCEL_LARGE_FILE, &FileIdRequest { file_id }).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for RemoteStorage {
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Remote
    }

    async fn get_upload_url(&self, bucket_id: &str) -> StorageResult<UploadTarget> {
        let mut target: UploadTarget = self
            .get_json(GET_UPLOAD_URL, &[("bucketId", bucket_id)])
            .await?;
        if target.bucket_id.is_empty() {
            target.bucket_id = bucket_id.to_string();
        }
        Ok(target)
    }

    async fn upload_file(
        &self,
        target: &UploadTarget,
        file_name: &str,
        checksum: &str,
        data: Bytes,
    ) -> StorageResult<FileDescriptor> {
        if file_name.is_empty() {
            return Err(StorageError::InvalidInput("file name is empty".to_string()));
        }
        let token = target.authorization_token.as_deref().ok_or_else(|| {
            StorageError::InvalidInput("upload target has no authorization token".to_string())
        })?;
        let size = data.len();

        let mut headers = self.auth_headers(token)?;
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
        headers.insert(
            FILE_NAME_HEADER,
            header_value(&urlencoding::encode(file_name))?,
        );
        headers.insert(CONTENT_SHA1_HEADER, header_value(checksum)?);

        let start = Instant::now();
        let response = self
            .transport
            .send(Method::POST, &target.upload_url, headers, data)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    error = %e,
                    file_name = %file_name,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote upload failed"
                );
            })?;

        let file: FileDescriptor = response.json()?;

        tracing::info!(
            file_id = %file.file_id,
            file_name = %file_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote upload successful"
        );

        Ok(file)
    }

    async fn download_file(&self, file_id: &str) -> StorageResult<Bytes> {
        require_file_id(file_id)?;
        self.download(file_id, None).await
    }

    async fn download_file_range(
        &self,
        file_id: &str,
        begin: u64,
        end: u64,
    ) -> StorageResult<Bytes> {
        require_file_id(file_id)?;
        if end < begin {
            return Err(StorageError::InvalidInput(format!(
                "range end {} is before begin {}",
                end, begin
            )));
        }
        self.download(file_id, Some((begin, end))).await
    }

    async fn list_files(
        &self,
        bucket_id: &str,
        max_count: u32,
        start_file_name: Option<&str>,
        start_file_id: Option<&str>,
    ) -> StorageResult<FileList> {
        let max_count = max_count.to_string();
        let mut query = vec![("bucketId", bucket_id), ("maxFileCount", max_count.as_str())];
        if let Some(name) = start_file_name.filter(|s| !s.is_empty()) {
            query.push(("startFileName", name));
        }
        if let Some(id) = start_file_id.filter(|s| !s.is_empty()) {
            query.push(("startFileId", id));
        }

        self.get_json(LIST_FILE_VERSIONS, &query).await
    }

    async fn delete_file(&self, file_id: &str, file_name: &str) -> StorageResult<()> {
        require_file_id(file_id)?;
        let request = DeleteFileVersionRequest { file_id, file_name };
        self.post(DELETE_FILE_VERSION, &request).await?;

        tracing::info!(
            file_id = %file_id,
            file_name = %file_name,
            "Remote delete successful"
        );

        Ok(())
    }
}
