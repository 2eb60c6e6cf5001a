//! Page fetching strategies for a single crawler node
//!
//! Every strategy implements [`Crawler`]. A fetch that times out or fails in a
//! recoverable way yields an absent page rather than an error; only failures that
//! invalidate a whole invocation (cache store, task panic) are returned as
//! [`CrawlError`].
//!
//! - [`direct::DirectHttpCrawler`] issues one plain HTTP GET per URL
//! - [`browser::PooledBrowserCrawler`] renders pages in pooled headless browsers
//! - [`crate::cache::CachingCrawler`] wraps either one with a TTL store

pub mod browser;
pub mod chrome;
pub mod direct;
pub mod pool;

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::models::PageMap;
use crate::utils::dedup_urls;
use crate::utils::error::{CrawlError, PoolError};

/// A page-fetching strategy
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Short strategy name, used for cache namespaces and metrics labels
    fn name(&self) -> &str;

    /// Fetch one URL; `Ok(None)` when the page could not be obtained
    async fn crawl_one(&self, url: &str) -> Result<Option<String>, CrawlError>;

    /// Fetch a batch of URLs concurrently
    ///
    /// URLs that could not be obtained are missing from the map. The default
    /// runs [`Crawler::crawl_one`] for every distinct URL and fails on the first
    /// fatal error.
    async fn crawl_many(&self, urls: &[String]) -> Result<PageMap, CrawlError> {
        let urls = dedup_urls(urls);
        let results = join_all(urls.iter().map(|url| self.crawl_one(url))).await;

        let mut pages = PageMap::with_capacity(urls.len());
        for (url, result) in urls.into_iter().zip(results) {
            if let Some(content) = result? {
                pages.insert(url, content);
            }
        }

        Ok(pages)
    }
}

#[async_trait]
impl<T: Crawler + ?Sized> Crawler for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn crawl_one(&self, url: &str) -> Result<Option<String>, CrawlError> {
        (**self).crawl_one(url).await
    }

    async fn crawl_many(&self, urls: &[String]) -> Result<PageMap, CrawlError> {
        (**self).crawl_many(urls).await
    }
}

/// Node-wide bound on concurrent fetches
///
/// Shared by every strategy of a node: each direct fetch and each browser render
/// holds one permit for its duration.
#[derive(Debug, Clone)]
pub struct FetchBudget {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl FetchBudget {
    /// Create a budget allowing `capacity` fetches in flight (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, CrawlError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| CrawlError::Pool(PoolError::Closed))
    }

    /// Number of fetches that may still start without waiting
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
