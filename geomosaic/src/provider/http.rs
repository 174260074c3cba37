//! HTTP client abstraction for testability.
//!
//! The traits expose status code and content type alongside the body because
//! the fetch retry table discriminates on them (429 vs other 4xx, image vs
//! non-image payloads). Transport-level failures (connect, timeout) are a
//! separate error type so callers can treat them as retryable.

use std::time::Duration;

use thiserror::Error;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default maximum idle connections kept per host.
pub const DEFAULT_POOL_MAX_IDLE: usize = 50;

/// A decoded HTTP response: status, content type, and raw body bytes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True when the `content-type` header declares an image payload.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.starts_with("image"))
            .unwrap_or(false)
    }
}

/// Transport-level failure: the request never produced an HTTP response.
///
/// Always retryable from the fetcher's point of view.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Failed to construct the underlying HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Connection, DNS, or timeout failure before a response arrived.
    #[error("request failed: {0}")]
    Request(String),
}

/// Trait for blocking HTTP GET operations.
///
/// Allows dependency injection of the transport so fetch logic can be tested
/// against scripted mock responses.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET and returns the full response.
    ///
    /// Non-2xx statuses are *not* errors at this layer; the caller applies
    /// the retry policy based on the status code.
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Trait for non-blocking HTTP GET operations.
///
/// The returned future is `Send` so fetches can be driven as spawned tasks.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET and returns the full response.
    fn get(
        &self,
        url: &str,
    ) -> impl std::future::Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Blocking HTTP client backed by `reqwest` with a bounded connection pool.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the default timeout and pool size.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(DEFAULT_POOL_MAX_IDLE)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .map_err(|e| TransportError::Request(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Async HTTP client backed by `reqwest` with a bounded connection pool.
///
/// Cheap to clone; clones share the same connection pool.
#[derive(Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with the default timeout and pool size.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a client with a custom per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(DEFAULT_POOL_MAX_IDLE)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
