//! Thin HTTP GET layer with bounded timeouts.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Connect and read bound for every outbound call. Network flakiness is the
/// expected case; retry and fallback policy live in the provider chain.
const WIRE_TIMEOUT: Duration = Duration::from_secs(4);

#[async_trait]
pub trait WireFetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("cursval/0.1")
            .connect_timeout(WIRE_TIMEOUT)
            .timeout(WIRE_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl WireFetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        debug!("Requesting rates from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request error for URL: {url}"))?;

        if !response.status().is_success() {
            bail!("HTTP error: {} for URL: {}", response.status(), url);
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read response body for URL: {url}"))
    }
}
