//! Production implementation of FeedSource over HTTP.

use crate::error::EnvError;
use crate::feed::FeedSource;
use crate::types::FeedBody;
use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Live feed backed by a single HTTP GET endpoint.
///
/// Every fetch bypasses intermediate caches; the endpoint is expected to
/// answer with a JSON array of vehicle states.
pub struct HttpFeed {
    /// Feed URL
    endpoint: String,

    /// HTTP client
    client: reqwest::Client,

    /// Request timeout, when one was configured
    timeout: Option<Duration>,
}

impl HttpFeed {
    /// Creates a feed with the transport's default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            timeout: None,
        }
    }

    /// Creates a feed whose requests give up after `timeout`.
    ///
    /// Fails when the HTTP client cannot be built (for example, no TLS
    /// backend is available).
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, EnvError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnvError::transport(format!("building http client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            timeout: Some(timeout),
        })
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the request timeout, if one was configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch(&self) -> Result<FeedBody, EnvError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(CACHE_CONTROL, "no-cache")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnvError::Timeout(self.timeout.map_or(0, |t| t.as_millis() as u64))
                } else {
                    EnvError::transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnvError::HttpStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EnvError::body(e.to_string()))?;

        let fetched_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        tracing::trace!(endpoint = %self.endpoint, bytes = bytes.len(), "feed fetched");
        Ok(FeedBody::new(bytes.to_vec(), fetched_at_ms))
    }

    fn describe(&self) -> String {
        format!("http feed {}", self.endpoint)
    }
}
