//! Account authorization
//!
//! Exchanges a key id and application key for an API URL and account token,
//! then builds a remote [`ServiceHandle`] from them.

use std::sync::Arc;

use base64::Engine;
use blobkit_core::constants::{API_PREFIX, DEFAULT_AUTH_URL};
use blobkit_core::ApiVersion;
use bytes::Bytes;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method};
use serde::Deserialize;

use crate::handle::{BackendLocation, ServiceHandle};
use crate::remote::RemoteStorage;
use crate::traits::{StorageError, StorageResult};
use crate::transport::Transport;

const AUTHORIZE_ACCOUNT: &str = "b2_authorize_account";

/// Result of a successful authorization, independent of API version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAuthorization {
    pub account_id: String,
    /// Without a trailing `/`.
    pub api_url: String,
    pub download_url: Option<String>,
    pub authorization_token: String,
    pub absolute_minimum_part_size: Option<usize>,
    pub recommended_part_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeV2Response {
    #[serde(default)]
    account_id: String,
    api_url: String,
    authorization_token: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    absolute_minimum_part_size: Option<usize>,
    #[serde(default)]
    recommended_part_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeV3Response {
    #[serde(default)]
    account_id: String,
    authorization_token: String,
    api_info: ApiInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInfo {
    storage_api: StorageApiInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageApiInfo {
    api_url: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    absolute_minimum_part_size: Option<usize>,
    #[serde(default)]
    recommended_part_size: Option<usize>,
}

impl From<AuthorizeV2Response> for AccountAuthorization {
    fn from(r: AuthorizeV2Response) -> Self {
        AccountAuthorization {
            account_id: r.account_id,
            api_url: r.api_url,
            download_url: r.download_url,
            authorization_token: r.authorization_token,
            absolute_minimum_part_size: r.absolute_minimum_part_size,
            recommended_part_size: r.recommended_part_size,
        }
    }
}

impl From<AuthorizeV3Response> for AccountAuthorization {
    fn from(r: AuthorizeV3Response) -> Self {
        let api = r.api_info.storage_api;
        AccountAuthorization {
            account_id: r.account_id,
            api_url: api.api_url,
            download_url: api.download_url,
            authorization_token: r.authorization_token,
            absolute_minimum_part_size: api.absolute_minimum_part_size,
            recommended_part_size: api.recommended_part_size,
        }
    }
}

/// Authorizes accounts against the authorization host.
#[derive(Debug, Clone)]
pub struct Authorizer {
    transport: Transport,
    auth_url: String,
}

impl Authorizer {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            auth_url: DEFAULT_AUTH_URL.to_string(),
        }
    }

    /// Point at a different authorization host (tests, private deployments).
    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Authorize and decode the version-specific response.
    pub async fn authorize_account(
        &self,
        key_id: &str,
        application_key: &str,
        api_version: ApiVersion,
    ) -> StorageResult<AccountAuthorization> {
        if key_id.is_empty() || application_key.is_empty() {
            return Err(StorageError::InvalidInput(
                "key id and application key must not be empty".to_string(),
            ));
        }

        let url = format!(
            "{}/{}/{}/{}",
            self.auth_url, API_PREFIX, api_version, AUTHORIZE_ACCOUNT
        );
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", key_id, application_key));
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {}", credentials)).map_err(|e| {
                StorageError::InvalidInput(format!("Invalid credentials header: {}", e))
            })?,
        );

        let response = self
            .transport
            .send(Method::GET, &url, headers, Bytes::new())
            .await
            .inspect_err(|e| {
                tracing::error!(error = %e, api_version = %api_version, "Account authorization failed");
            })?;

        let mut auth: AccountAuthorization = match api_version {
            ApiVersion::V2 => response.json::<AuthorizeV2Response>()?.into(),
            ApiVersion::V3 => response.json::<AuthorizeV3Response>()?.into(),
        };
        auth.api_url = auth.api_url.trim_end_matches('/').to_string();

        if auth.api_url.is_empty() || auth.authorization_token.is_empty() {
            return Err(StorageError::InvalidResponse(
                "authorization response is missing the API URL or token".to_string(),
            ));
        }

        tracing::info!(
            account_id = %auth.account_id,
            api_url = %auth.api_url,
            api_version = %api_version,
            "Account authorized"
        );

        Ok(auth)
    }

    /// Authorize and build a remote handle sharing this authorizer's transport.
    pub async fn authorize(
        &self,
        key_id: &str,
        application_key: &str,
        api_version: ApiVersion,
    ) -> StorageResult<(ServiceHandle, AccountAuthorization)> {
        let auth = self
            .authorize_account(key_id, application_key, api_version)
            .await?;

        let mut storage = RemoteStorage::new(
            self.transport.clone(),
            auth.api_url.clone(),
            auth.authorization_token.clone(),
            api_version,
        )?;
        if let Some(minimum) = auth.absolute_minimum_part_size {
            storage = storage.with_minimum_part_size(minimum);
        }

        let location = BackendLocation::Remote {
            api_base_url: auth.api_url.clone(),
            auth_token: auth.authorization_token.clone(),
        };
        let mut handle = ServiceHandle::new(Arc::new(storage), location, api_version)?;
        if let Some(recommended) = auth.recommended_part_size {
            handle = handle.with_recommended_part_size(recommended);
        }

        Ok((handle, auth))
    }
}
