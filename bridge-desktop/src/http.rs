//! Reqwest backed `HttpClient`

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse, RetryPolicy},
};
use futures_util::TryStreamExt;
use reqwest::{header::HeaderMap, Client, Method, RequestBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("opticam-dbx/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pooled HTTPS client (rustls) used for every Dropbox call
///
/// Buffered requests are retried according to the caller's `RetryPolicy`.
/// Streaming downloads are sent once; a broken stream surfaces as an I/O
/// error while reading the body.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    /// Applied to buffered requests that carry no timeout of their own
    rpc_timeout: Option<Duration>,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Streaming downloads are only bounded by the connect timeout since
    /// alarm videos can be large.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            rpc_timeout: Some(timeout),
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            rpc_timeout: None,
        }
    }

    fn method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        }
    }

    fn prepare(&self, request: HttpRequest, buffered: bool) -> RequestBuilder {
        let fallback = self.rpc_timeout.filter(|_| buffered);
        let builder = request.headers.into_iter().fold(
            self.client.request(Self::method(request.method), &request.url),
            |builder, (name, value)| builder.header(name, value),
        );
        let builder = match request.body {
            Some(body) => builder.body(body),
            None => builder,
        };
        match request.timeout.or(fallback) {
            Some(limit) => builder.timeout(limit),
            None => builder,
        }
    }

    fn headers(map: &HeaderMap) -> HashMap<String, String> {
        map.iter()
            .filter_map(|(name, value)| Some((name.to_string(), value.to_str().ok()?.to_string())))
            .collect()
    }

    fn transport_error(e: reqwest::Error) -> BridgeError {
        let message = if e.is_timeout() {
            format!("request to {} timed out", Self::url_of(&e))
        } else if e.is_connect() {
            format!("could not connect to {}: {}", Self::url_of(&e), e)
        } else {
            e.to_string()
        };
        BridgeError::OperationFailed(message)
    }

    fn url_of(e: &reqwest::Error) -> String {
        e.url().map(|u| u.to_string()).unwrap_or_else(|| "server".to_string())
    }

    /// One buffered attempt. The inner `Err` carries a status that is worth
    /// retrying.
    async fn attempt(&self, request: &HttpRequest) -> Result<std::result::Result<HttpResponse, u16>> {
        let response = self
            .prepare(request.clone(), true)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status().as_u16();
        if RetryPolicy::is_retryable(status) {
            return Ok(Err(status));
        }

        let headers = Self::headers(response.headers());
        let body = response.bytes().await.map_err(Self::transport_error)?;
        Ok(Ok(HttpResponse {
            status,
            headers,
            body,
        }))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default()).await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let attempts = policy.max_attempts.max(1);
        let mut failure = BridgeError::OperationFailed("no attempt was made".to_string());

        for attempt in 1..=attempts {
            debug!(attempt, attempts, url = %request.url, "Sending request");

            match self.attempt(&request).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(status)) => {
                    warn!(status, attempt, url = %request.url, "Server asked to retry");
                    failure = BridgeError::OperationFailed(format!("HTTP {} from {}", status, request.url));
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Request failed");
                    failure = e;
                }
            }

            if attempt < attempts {
                let delay = policy.delay_for(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Waiting before retry");
                tokio::time::sleep(delay).await;
            }
        }

        Err(failure)
    }

    async fn download_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse> {
        debug!(url = %request.url, "Opening streaming download");

        let response = self
            .prepare(request, false)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status().as_u16();
        let headers = Self::headers(response.headers());
        let chunks = response.bytes_stream().map_err(std::io::Error::other);

        Ok(HttpStreamResponse {
            status,
            headers,
            body: Box::new(StreamReader::new(chunks)),
        })
    }
}
