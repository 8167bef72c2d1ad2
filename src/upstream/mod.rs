//! Upstream CSV source abstraction.
//!
//! The proxy only ever talks to the FIRMS feed through the [`FireSource`]
//! trait, so the HTTP client can be swapped for a scripted source in tests.

pub mod firms;
#[cfg(test)]
pub(crate) mod scripted;

use bytes::Bytes;

use crate::range::RangeKey;

pub use firms::FirmsClient;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an upstream fetch did not produce a usable payload.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Upstream answered with a non-success status.
    #[error("NASA FIRMS returned HTTP {0}")]
    Status(u16),
    /// Upstream answered 2xx but the body is empty or implausibly short.
    #[error("Empty or invalid response from NASA FIRMS")]
    EmptyResponse,
    /// The request never completed (DNS, connect, TLS, body read, timeout).
    #[error("request to NASA FIRMS failed: {0}")]
    Network(#[source] reqwest::Error),
}

impl UpstreamError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "http_status",
            Self::EmptyResponse => "empty_response",
            Self::Network(_) => "network",
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Something that can fetch the raw CSV body for a range.
#[async_trait::async_trait]
pub trait FireSource: Send + Sync {
    /// Perform a single fetch attempt.  No retries.
    async fn fetch_csv(&self, range: RangeKey) -> Result<Bytes, UpstreamError>;
}

/// Fetch from `source` and reject bodies shorter than `min_payload_bytes`.
pub async fn fetch_checked(
    source: &dyn FireSource,
    range: RangeKey,
    min_payload_bytes: usize,
) -> Result<Bytes, UpstreamError> {
    let body = source.fetch_csv(range).await?;
    if body.len() < min_payload_bytes {
        return Err(UpstreamError::EmptyResponse);
    }
    Ok(body)
}
