//! HTTP transport adapter
//!
//! `HttpClient` is the seam to the network: one request in, one response out.
//! `Transport` wraps a client and turns non-2xx responses into classified
//! `StorageError`s, so backends only ever see successful responses.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blobkit_core::constants::DEFAULT_HTTP_TIMEOUT_SECS;
use blobkit_core::ClientConfig;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::traits::{StorageError, StorageResult};

/// Longest response body excerpt kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Transport settings applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl From<&ClientConfig> for TransportConfig {
    fn from(config: &ClientConfig) -> Self {
        TransportConfig {
            timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> StorageResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            StorageError::InvalidResponse(format!("Failed to parse response as JSON: {}", e))
        })
    }
}

/// Sends one HTTP request and returns the raw response, whatever its status.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> StorageResult<HttpResponse>;
}

/// `HttpClient` backed by `reqwest`, with the configured per-request timeout.
#[derive(Clone, Debug)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(config: &TransportConfig) -> StorageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> StorageResult<HttpResponse> {
        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(request_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn request_error(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Timeout(e.to_string())
    } else {
        StorageError::Transport(e.to_string())
    }
}

/// Error body returned by the API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Transport adapter shared by the remote backend and authorization.
#[derive(Clone)]
pub struct Transport {
    client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish()
    }
}

impl Transport {
    /// Create a transport over a `reqwest` client.
    pub fn new(config: &TransportConfig) -> StorageResult<Self> {
        Ok(Self::with_client(Arc::new(ReqwestClient::new(config)?)))
    }

    pub fn with_client(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Send a request; any status outside 2xx becomes an error.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> StorageResult<HttpResponse> {
        let response = self
            .client
            .send(HttpRequest {
                method: method.clone(),
                url: url.to_string(),
                headers,
                body,
            })
            .await?;

        if !response.status.is_success() {
            let err = classify_rejection(response.status, &response.body);
            tracing::debug!(
                method = %method,
                url = %url,
                status = response.status.as_u16(),
                error = %err,
                "Request rejected"
            );
            return Err(err);
        }

        Ok(response)
    }
}

/// Map a non-2xx response to an error kind.
///
/// A 404 stays a rejection: `NotFound` is reserved for objects known to be
/// missing locally, which no retry can fix.
fn classify_rejection(status: StatusCode, body: &[u8]) -> StorageError {
    let (code, message) = match serde_json::from_slice::<ApiErrorBody>(body) {
        Ok(parsed) => (parsed.code, parsed.message),
        Err(_) => {
            let text = String::from_utf8_lossy(body);
            (String::new(), text.chars().take(MAX_ERROR_BODY_CHARS).collect())
        }
    };

    let lowered = message.to_lowercase();
    if status == StatusCode::BAD_REQUEST && (lowered.contains("sha1") || lowered.contains("checksum"))
    {
        return StorageError::IntegrityMismatch(message);
    }

    StorageError::Rejected {
        status: status.as_u16(),
        code,
        message,
    }
}
