//! Dropbox API connector implementation
//!
//! Implements the `StorageProvider` trait for the Dropbox HTTP API v2.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bridge_traits::storage::{RemoteFile, StorageProvider};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, instrument};

use crate::error::DropboxError;
use crate::types::{
    ApiErrorResponse, FileMetadata, ListFolderArg, ListFolderContinueArg, ListFolderResult,
    ListRevisionsArg, ListRevisionsResult, Metadata, PathArg,
};

/// RPC endpoint base URL
pub const DROPBOX_API_BASE: &str = "https://api.dropboxapi.com/2";

/// Content (download/upload) endpoint base URL
pub const DROPBOX_CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Largest revision page the API accepts
const MAX_REVISIONS: u32 = 100;

/// Dropbox API connector
///
/// # Features
///
/// - Folder listing that follows `list_folder/continue` until exhausted
/// - Revision history listing
/// - Streaming downloads, optionally of a specific revision
/// - Deletion with a distinct not-found error
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::DropboxConnector;
/// use bridge_traits::storage::StorageProvider;
///
/// let connector = DropboxConnector::new(http_client, access_token);
/// let files = connector.list_folder("/apps/ipcamera", true).await?;
/// ```
pub struct DropboxConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// OAuth 2.0 bearer token
    access_token: String,

    api_base: String,
    content_base: String,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl DropboxConnector {
    /// Create a new Dropbox connector
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `access_token` - Bearer token with `files.content.read` (and
    ///   `files.content.write` when remote removal is enabled)
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: impl Into<String>) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
            api_base: DROPBOX_API_BASE.to_string(),
            content_base: DROPBOX_CONTENT_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Timeout applied to RPC calls (downloads are not bounded)
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Point the connector at different hosts, e.g. a local test server
    pub fn with_base_urls(mut self, api_base: impl Into<String>, content_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.content_base = content_base.into();
        self
    }

    /// Dropbox addresses the root folder as the empty string
    fn api_path(path: &str) -> String {
        if path == "/" {
            String::new()
        } else {
            path.to_string()
        }
    }

    /// Parse RFC 3339 timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Convert Dropbox file metadata to RemoteFile
    fn convert_file(file: FileMetadata) -> RemoteFile {
        let path = file
            .path_lower
            .or(file.path_display)
            .unwrap_or_else(|| file.name.clone());

        let remote = RemoteFile::new(path, file.name, file.size);
        match file.server_modified.as_deref().and_then(Self::parse_timestamp) {
            Some(modified_at) => remote.with_modified_at(modified_at),
            None => remote,
        }
    }

    /// JSON for the `Dropbox-API-Arg` header
    ///
    /// HTTP headers must be ASCII, so every non-ASCII character is written as
    /// a `\uXXXX` escape (UTF-16 surrogate pairs above the BMP).
    fn header_safe_json<T: Serialize>(arg: &T) -> std::result::Result<String, DropboxError> {
        let json = serde_json::to_string(arg)
            .map_err(|e| DropboxError::ParseError(format!("Failed to encode argument: {}", e)))?;

        let mut escaped = String::with_capacity(json.len());
        for c in json.chars() {
            if c.is_ascii() {
                escaped.push(c);
            } else {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf).iter() {
                    escaped.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
        Ok(escaped)
    }

    /// Map a non-2xx response to a provider error
    fn map_error_status(
        status: u16,
        headers: &HashMap<String, String>,
        body: &[u8],
        path: &str,
    ) -> DropboxError {
        let summary = serde_json::from_slice::<ApiErrorResponse>(body).ok();

        match status {
            401 => DropboxError::AuthenticationFailed(
                summary
                    .map(|s| s.error_summary)
                    .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
            ),
            409 => match summary {
                Some(s) if s.is_not_found() => DropboxError::PathNotFound {
                    path: path.to_string(),
                },
                Some(s) => DropboxError::ApiError {
                    status_code: status,
                    message: s.error_summary,
                },
                None => DropboxError::ApiError {
                    status_code: status,
                    message: String::from_utf8_lossy(body).into_owned(),
                },
            },
            429 => DropboxError::RateLimitExceeded {
                retry_after_seconds: headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("retry-after"))
                    .and_then(|(_, v)| v.trim().parse().ok())
                    .unwrap_or(0),
            },
            _ => DropboxError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }

    /// Call an RPC endpoint with a JSON argument and decode the JSON result
    async fn rpc<A, R>(&self, endpoint: &str, arg: &A, path: &str) -> std::result::Result<R, DropboxError>
    where
        A: Serialize + Sync,
        R: DeserializeOwned,
    {
        let request = HttpRequest::new(HttpMethod::Post, format!("{}/{}", self.api_base, endpoint))
            .bearer_token(&self.access_token)
            .timeout(self.request_timeout)
            .json(arg)?;

        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if !response.is_success() {
            debug!(endpoint, status = response.status, "Dropbox RPC failed");
            return Err(Self::map_error_status(
                response.status,
                &response.headers,
                &response.body,
                path,
            ));
        }

        serde_json::from_slice(&response.body).map_err(|e| {
            DropboxError::ParseError(format!("Failed to parse {} response: {}", endpoint, e))
        })
    }
}

impl fmt::Debug for DropboxConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxConnector")
            .field("access_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("content_base", &self.content_base)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl StorageProvider for DropboxConnector {
    #[instrument(skip(self))]
    async fn list_folder(&self, path: &str, include_media_info: bool) -> Result<Vec<RemoteFile>> {
        debug!("Listing Dropbox folder");

        let arg = ListFolderArg {
            path: Self::api_path(path),
            recursive: false,
            include_media_info,
            include_deleted: false,
        };
        let mut page: ListFolderResult = self.rpc("files/list_folder", &arg, path).await?;

        let mut files = Vec::new();
        let mut pages = 1;
        loop {
            for entry in page.entries {
                match entry {
                    Metadata::File(file) => files.push(Self::convert_file(file)),
                    Metadata::Folder(folder) => debug!(name = %folder.name, "Ignoring folder"),
                    Metadata::Deleted(deleted) => {
                        debug!(name = %deleted.name, "Ignoring deleted entry")
                    }
                }
            }

            if !page.has_more {
                break;
            }

            let arg = ListFolderContinueArg {
                cursor: page.cursor,
            };
            page = self.rpc("files/list_folder/continue", &arg, path).await?;
            pages += 1;
        }

        info!(count = files.len(), pages, "Listed files from Dropbox");
        Ok(files)
    }

    #[instrument(skip(self))]
    async fn list_revisions(&self, path: &str) -> Result<Vec<RemoteFile>> {
        let arg = ListRevisionsArg {
            path: path.to_string(),
            mode: "path",
            limit: MAX_REVISIONS,
        };
        let result: ListRevisionsResult = self.rpc("files/list_revisions", &arg, path).await?;

        if result.is_deleted {
            debug!("File is deleted, listing its past revisions");
        }

        let revisions: Vec<RemoteFile> = result
            .entries
            .into_iter()
            .map(|file| {
                let rev = file.rev.clone();
                Self::convert_file(file).with_rev(rev)
            })
            .collect();

        debug!(count = revisions.len(), "Listed revisions");
        Ok(revisions)
    }

    #[instrument(skip(self, file), fields(path = %file.path, rev = ?file.rev))]
    async fn download(&self, file: &RemoteFile) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let target = match &file.rev {
            Some(rev) => format!("rev:{}", rev),
            None => file.path.clone(),
        };
        let api_arg = Self::header_safe_json(&PathArg { path: target })?;

        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}/files/download", self.content_base),
        )
        .bearer_token(&self.access_token)
        .header("Dropbox-API-Arg", api_arg);

        let mut response = self.http_client.download_stream(request).await?;

        if !response.is_success() {
            let mut body = Vec::new();
            response
                .body
                .read_to_end(&mut body)
                .await
                .map_err(BridgeError::Io)?;
            return Err(
                Self::map_error_status(response.status, &response.headers, &body, &file.path).into(),
            );
        }

        debug!("Download stream opened");
        Ok(response.body)
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        let arg = PathArg {
            path: path.to_string(),
        };
        let _: serde_json::Value = self.rpc("files/delete_v2", &arg, path).await?;

        debug!("Deleted remote file");
        Ok(())
    }
}
