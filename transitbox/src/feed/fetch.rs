//! Retrieval of raw feed payloads.
//!
//! The ingestion engine talks to the network through [`FeedFetcher`] so tests
//! can script responses. The trait returns boxed futures to stay usable as a
//! trait object.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use super::error::FetchError;

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default request timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of raw feed bytes.
pub trait FeedFetcher: Send + Sync {
    /// Fetch the payload at `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>>;
}

/// HTTP fetcher built on reqwest.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("transitbox/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

impl FeedFetcher for HttpFeedFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            let response =
                self.client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| FetchError::Transport {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await.map_err(|e| FetchError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            trace!(url, bytes = body.len(), "Feed payload received");
            Ok(body)
        })
    }
}
