//! HTTP Client Abstraction
//!
//! The Dropbox API only needs two shapes of exchange: small JSON RPC calls whose
//! response is buffered, and content downloads whose body is streamed to disk.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    /// Every Dropbox v2 endpoint, including content downloads, is a POST
    Post,
}

/// Outgoing request, assembled with the chained setters below
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Overrides the client's default timeout when set
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.header("Authorization", value)
    }

    /// Serialize `arg` as the request body and tag it as JSON
    pub fn json<T: Serialize>(self, arg: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(arg)
            .map_err(|e| BridgeError::OperationFailed(format!("Cannot encode request body: {}", e)))?;
        let mut request = self.header("Content-Type", "application/json");
        request.body = Some(Bytes::from(encoded));
        Ok(request)
    }

    pub fn timeout(self, limit: Duration) -> Self {
        Self {
            timeout: Some(limit),
            ..self
        }
    }
}

/// Fully buffered response of an RPC call
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }
}

/// Response whose body is still on the wire
///
/// The body is handed out as an `AsyncRead` so large payloads can be copied
/// straight to disk without being buffered in memory.
pub struct HttpStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Box<dyn AsyncRead + Send + Unpin>,
}

impl HttpStreamResponse {
    pub fn is_success(&self) -> bool {
        is_success_status(self.status)
    }
}

impl fmt::Debug for HttpStreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// How often, and how patiently, a buffered request is re-sent
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Double the delay after every failed attempt instead of keeping it flat
    pub exponential: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            exponential: true,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Rate limiting and server side failures are worth another attempt.
    pub fn is_retryable(status: u16) -> bool {
        status == 429 || status >= 500
    }

    /// Delay to wait before the given retry (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if !self.exponential {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Transport used by storage providers
///
/// Implementations retry 429 and 5xx answers of buffered requests with
/// backoff and validate TLS certificates.
///
/// ```ignore
/// let request = HttpRequest::new(HttpMethod::Post, "https://api.dropboxapi.com/2/files/list_folder")
///     .bearer_token(token)
///     .json(&serde_json::json!({ "path": "/apps/ipcamera" }))?;
/// let listing: serde_json::Value = serde_json::from_slice(&client.execute(request).await?.body)?;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send the request and buffer the whole response body
    ///
    /// Non-2xx answers that are not retried come back as `Ok`; only
    /// transport failures and exhausted retries are errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute an HTTP request with custom retry policy
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }

    /// Execute an HTTP request and return the body as a byte stream
    ///
    /// Non-2xx responses are returned as-is so callers can inspect the
    /// error payload.
    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse>;
}
