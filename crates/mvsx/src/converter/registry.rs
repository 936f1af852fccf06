//! Fetcher registry for external resources
//!
//! The registry routes each external URL to the first fetcher that supports
//! its scheme. A scheme that is classified as external but has no registered
//! fetcher (`ftp` by default) fails that one fetch, which the resolver then
//! batches with any other failures.

use crate::converter::{
    backends::HttpFetcher,
    config::ConvertConfig,
    core::{FetchError, ProgressCallback, Result},
};
use async_trait::async_trait;
use std::path::Path;
use url::Url;

/// Trait for different fetch implementations
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch `url` into `dest_path`, returning the number of bytes written
    ///
    /// Implementations must not leave a partial file at `dest_path` when
    /// they fail.
    async fn fetch(
        &self,
        url: &Url,
        dest_path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> std::result::Result<u64, FetchError>;

    /// Check if this fetcher handles the given (lowercase) scheme
    fn supports_scheme(&self, scheme: &str) -> bool;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Registry for managing multiple fetcher implementations
pub struct FetcherRegistry {
    fetchers: Vec<Box<dyn ResourceFetcher>>,
}

impl FetcherRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            fetchers: Vec::new(),
        }
    }

    /// Register a new fetcher implementation
    pub fn register<F: ResourceFetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetchers.push(Box::new(fetcher));
        self
    }

    /// Add an HTTP/HTTPS fetcher with the given configuration
    pub fn with_http_fetcher(self, config: &ConvertConfig) -> Result<Self> {
        Ok(self.register(HttpFetcher::new(config)?))
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Find the fetcher for a given URL
    pub fn find_fetcher(&self, url: &Url) -> std::result::Result<&dyn ResourceFetcher, FetchError> {
        self.fetchers
            .iter()
            .find(|f| f.supports_scheme(url.scheme()))
            .map(|f| f.as_ref())
            .ok_or_else(|| FetchError::UnsupportedScheme {
                url: url.to_string(),
                scheme: url.scheme().to_string(),
            })
    }

    /// Fetch with the appropriate fetcher
    pub async fn attempt_fetch(
        &self,
        url: &Url,
        dest_path: &Path,
        progress_callback: Option<ProgressCallback>,
    ) -> std::result::Result<u64, FetchError> {
        let fetcher = self.find_fetcher(url)?;
        fetcher.fetch(url, dest_path, progress_callback).await
    }
}

impl Default for FetcherRegistry {
    fn default() -> Self {
        Self::new()
    }
}
