//! NASA FIRMS CSV client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::range::RangeKey;

use super::{FireSource, UpstreamError};

/// Build the shared HTTP client used for upstream fetches.
pub fn build_http_client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
    if let Some(timeout) = config.request_timeout() {
        builder = builder.timeout(timeout);
    }
    builder.build().context("failed to build reqwest client")
}

/// Fetches the per-range CSV feeds over HTTP.
#[derive(Debug, Clone)]
pub struct FirmsClient {
    http_client: reqwest::Client,
    config: UpstreamConfig,
}

impl FirmsClient {
    pub fn new(http_client: reqwest::Client, config: UpstreamConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl FireSource for FirmsClient {
    async fn fetch_csv(&self, range: RangeKey) -> Result<Bytes, UpstreamError> {
        let url = self.config.url_for(range);
        debug!(%range, %url, "fetching FIRMS CSV");

        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::Network)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(UpstreamError::Network)?;
        debug!(%range, size_bytes = body.len(), "FIRMS CSV received");
        Ok(body)
    }
}
