//! Retry classification and backoff.
//!
//! Each fetch attempt resolves to exactly one [`Disposition`]:
//!
//! ```text
//! Pending ──► Success
//!         ──► Retryable ──► Pending (until max_retries)
//!         ──► Permanent
//! ```
//!
//! Backoff is a pure function of the attempt number so the schedule is
//! identical under every concurrency strategy.

use std::time::Duration;

use thiserror::Error;

use crate::provider::{HttpResponse, TransportError};

/// Base backoff delay in milliseconds.
pub const BACKOFF_BASE_MS: u64 = 500;

/// Upper bound on a single backoff delay in milliseconds.
pub const BACKOFF_CAP_MS: u64 = 8_000;

/// Why a single tile fetch attempt (or the whole tile) failed.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// HTTP 429 from the provider.
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// HTTP 5xx from the provider.
    #[error("transient server error (HTTP {0})")]
    TransientServerError(u16),

    /// Connection, DNS, or timeout failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// HTTP 4xx other than 429; retrying cannot help.
    #[error("permanent client error (HTTP {0})")]
    PermanentClientError(u16),

    /// HTTP 200 whose content type is not an image.
    #[error("response is not an image (content-type {0:?})")]
    NotAnImage(Option<String>),

    /// The image bytes could not be decoded.
    #[error("failed to decode tile image: {0}")]
    DecodeFailed(String),

    /// Failed to spool the decoded tile to disk.
    #[error("failed to write tile to spool: {0}")]
    SpoolWrite(String),

    /// The tile URL could not be built (bad signing secret).
    #[error("failed to build tile URL: {0}")]
    UrlBuild(String),
}

/// Outcome class of one attempt.
#[derive(Debug, Clone)]
pub enum Disposition {
    /// HTTP 200 with an image payload; proceed to decode.
    Success(Vec<u8>),
    /// Transient failure; retry with backoff if attempts remain.
    Retryable(FetchError),
    /// Permanent failure; no further attempts.
    Permanent(FetchError),
}

/// Classifies one attempt's transport result per the retry table.
pub fn classify(result: Result<HttpResponse, TransportError>) -> Disposition {
    match result {
        Err(e) => Disposition::Retryable(FetchError::Transport(e.to_string())),
        Ok(response) => match response.status {
            200 if response.is_image() => Disposition::Success(response.body),
            200 => Disposition::Permanent(FetchError::NotAnImage(response.content_type)),
            429 => Disposition::Retryable(FetchError::RateLimited),
            status if (500..600).contains(&status) => {
                Disposition::Retryable(FetchError::TransientServerError(status))
            }
            status if (400..500).contains(&status) => {
                Disposition::Permanent(FetchError::PermanentClientError(status))
            }
            // 1xx/3xx without a body we can use: treat as transient.
            status => Disposition::Retryable(FetchError::TransientServerError(status)),
        },
    }
}

/// Backoff delay before retrying after attempt `attempt` (0-based).
///
/// `base * 2^attempt`, capped at [`BACKOFF_CAP_MS`].
pub fn backoff(attempt: u32) -> Duration {
    let ms = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(ms.min(BACKOFF_CAP_MS))
}
