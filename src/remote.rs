//! Remote feed client
//!
//! Fetches the raw lookup feed over HTTP(S), optionally presenting a client
//! certificate. The client holds no state beyond its configuration and never
//! retries; retry policy belongs to the refresh coordinator.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Identity};
use thiserror::Error;

use crate::config::LookupConfig;

/// Errors that can occur when fetching the feed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Transport failure: DNS, connect, reset, timeout, truncated body
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-2xx status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Client certificate could not be loaded or the TLS client not built
    #[error("TLS setup failed: {0}")]
    Tls(String),
}

/// Source of the authoritative feed
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetches the raw feed body
    async fn fetch(&self) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) implementation of `RemoteSource`
#[derive(Debug, Clone)]
pub struct HttpSource {
    /// HTTP client, carrying the client identity if one is configured
    http_client: Client,
    /// Feed URL
    url: String,
}

impl HttpSource {
    /// Creates a source from the lookup configuration
    ///
    /// Reads the client certificate (PEM with certificate and private key)
    /// if one is configured. The client enforces `refresh_timeout` on the
    /// whole request.
    ///
    /// # Arguments
    /// * `config` - Supplies the feed URL, client certificate and timeout
    ///
    /// # Returns
    /// * `Ok(HttpSource)` ready to fetch
    /// * `Err(FetchError::Tls)` if the certificate is unreadable or invalid
    pub fn new(config: &LookupConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder().timeout(config.refresh_timeout);

        if let Some(ref cert_path) = config.client_cert {
            let pem = std::fs::read(cert_path).map_err(|e| {
                FetchError::Tls(format!("cannot read {}: {}", cert_path.display(), e))
            })?;
            let identity = Identity::from_pem(&pem).map_err(|e| FetchError::Tls(e.to_string()))?;
            builder = builder.identity(identity);
        }

        let http_client = builder.build().map_err(|e| FetchError::Tls(e.to_string()))?;

        Ok(Self {
            http_client,
            url: config.url.clone(),
        })
    }

    /// Creates a plain HTTP source with the given timeout
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Self::new(&LookupConfig::new(url).with_refresh_timeout(timeout))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http_client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(network_error)?;
        Ok(body.to_vec())
    }
}

fn network_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Network(format!("request timed out: {}", e))
    } else {
        FetchError::Network(e.to_string())
    }
}
