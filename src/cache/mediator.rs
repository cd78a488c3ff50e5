//! Fetch mediator: cache-first access to external data
//!
//! Every outbound request goes through [`FetchMediator`], which returns the
//! stored payload when the request's cache key is present and otherwise
//! performs the real fetch, stores the result and returns it. Failed fetches
//! are never stored.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::key::RequestDescriptor;
use super::store::{CacheError, CacheStore};

/// Default request timeout for the HTTP transport
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors that can occur when fetching through the mediator
#[derive(Debug, Error)]
pub enum FetchError {
    /// The transport failed (connection, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// The response body was not valid JSON
    #[error("Failed to parse JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The fetched payload could not be flushed to the cache file
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Source of uncached payloads
///
/// Implemented by [`HttpTransport`] for real requests; tests substitute a
/// counting fake.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a GET with query parameters and parses the body as JSON
    async fn get_json(
        &self,
        base: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, FetchError>;

    /// Performs a plain GET and returns the body text
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// `reqwest`-backed transport with an optional bearer token
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Creates a transport with the default timeout and no authorization
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cafescout/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            bearer_token: None,
        })
    }

    /// Sends `Authorization: Bearer <token>` with structured requests
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Converts a non-success status into [`FetchError::Status`]
    fn check_status(response: &reqwest::Response) -> Result<(), FetchError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(FetchError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        base: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, FetchError> {
        let mut request = self.client.get(base).query(params);
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        Self::check_status(&response)?;

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        Self::check_status(&response)?;
        Ok(response.text().await?)
    }
}

/// Hit/miss counters for one mediator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Requests answered from the cache
    pub hits: u64,
    /// Requests that went to the transport
    pub misses: u64,
}

/// Cache-first fetcher owning the cache store
///
/// Both fetch operations take `&mut self`, so a lookup and the following
/// insertion can never interleave with another request for the same key.
#[derive(Debug)]
pub struct FetchMediator<T: Transport> {
    store: CacheStore,
    transport: T,
    stats: FetchStats,
}

impl<T: Transport> FetchMediator<T> {
    /// Creates a mediator over an already loaded store
    pub fn new(store: CacheStore, transport: T) -> Self {
        Self {
            store,
            transport,
            stats: FetchStats::default(),
        }
    }

    /// Returns the underlying cache store
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Returns the hit/miss counters
    pub fn stats(&self) -> FetchStats {
        self.stats
    }

    /// Returns the structured payload for `request`, fetching it at most once
    ///
    /// # Returns
    /// * `Ok(Value)` - The cached or freshly fetched payload
    /// * `Err(FetchError)` - If the fetch failed or the cache could not be flushed
    pub async fn fetch_with_cache(&mut self, request: &RequestDescriptor) -> Result<Value, FetchError> {
        let key = request.cache_key();

        if let Some(cached) = self.store.get(&key) {
            info!(key = %key, "Using cache");
            self.stats.hits += 1;
            return Ok(cached.clone());
        }

        info!(key = %key, "Fetching");
        self.stats.misses += 1;
        let payload = self
            .transport
            .get_json(&request.base, &request.params)
            .await?;

        self.store.put(key, payload.clone())?;
        Ok(payload)
    }

    /// Returns the body text of `url`, fetching it at most once
    ///
    /// The url itself is the cache key. A stored payload under that key that
    /// is not a string is replaced by a fresh fetch.
    pub async fn fetch_text_with_cache(&mut self, url: &str) -> Result<String, FetchError> {
        match self.store.get(url) {
            Some(Value::String(text)) => {
                info!(url = %url, "Using cache");
                self.stats.hits += 1;
                return Ok(text.clone());
            }
            Some(_) => {
                warn!(url = %url, "Cached page is not text, refetching");
            }
            None => {}
        }

        info!(url = %url, "Fetching");
        self.stats.misses += 1;
        let text = self.transport.get_text(url).await?;
        debug!(url = %url, bytes = text.len(), "Fetched page");

        self.store.put(url, Value::String(text.clone()))?;
        Ok(text)
    }
}
