//! JavaScript-rendering crawler backed by a pool of headless browsers
//!
//! Each URL gets up to [`DEFAULT_MAX_ATTEMPTS`] attempts. An attempt leases a
//! session, takes a slot from the node's fetch budget and renders the page under
//! a per-attempt deadline. Timed-out and failed attempts both consume the budget;
//! once it is spent the page is reported absent.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::pool::{BrowserSession, SessionFactory, SessionPool};
use super::{Crawler, FetchBudget};
use crate::config::BrowserConfig;
use crate::metrics;
use crate::utils::error::CrawlError;
use crate::utils::retry::{retry_attempts, Attempt, RetryConfig, DEFAULT_MAX_ATTEMPTS};

/// Renders pages in pooled browser sessions with bounded retries
pub struct PooledBrowserCrawler<F: SessionFactory> {
    pool: Arc<SessionPool<F>>,
    budget: FetchBudget,
    fetch_timeout: Duration,
    settle: Duration,
    retry: RetryConfig,
}

impl<F: SessionFactory> PooledBrowserCrawler<F> {
    /// Strategy name and cache namespace
    pub const NAME: &'static str = "browser";

    /// Create a crawler over a pool sized by `config.instances`
    pub fn new(factory: F, budget: FetchBudget, config: &BrowserConfig) -> Self {
        Self::with_timing(
            SessionPool::new(factory, config.instances),
            budget,
            config.timeout(),
            config.settle(),
        )
    }

    /// Create a crawler over an existing pool with explicit timing
    ///
    /// `settle` is both the post-load wait inside a render and the pause
    /// between two attempts.
    pub fn with_timing(
        pool: SessionPool<F>,
        budget: FetchBudget,
        fetch_timeout: Duration,
        settle: Duration,
    ) -> Self {
        Self {
            pool: Arc::new(pool),
            budget,
            fetch_timeout,
            settle,
            retry: RetryConfig::new(DEFAULT_MAX_ATTEMPTS, settle),
        }
    }

    pub fn pool(&self) -> &SessionPool<F> {
        &self.pool
    }

    /// Close the session pool; in-flight leases finish normally
    pub async fn shutdown(&self) {
        self.pool.close().await;
    }

    async fn attempt(&self, url: &str) -> Attempt<String> {
        let mut lease = match self.pool.acquire().await {
            Ok(lease) => lease,
            Err(e) => return Attempt::Failed(e.into()),
        };
        let _slot = match self.budget.acquire().await {
            Ok(permit) => permit,
            Err(e) => return Attempt::Failed(e.into()),
        };

        match tokio::time::timeout(self.fetch_timeout, lease.render(url, self.settle)).await {
            Ok(Ok(html)) => {
                metrics::record_browser_attempt("success");
                Attempt::Success(html)
            }
            Ok(Err(e)) => {
                metrics::record_browser_attempt("error");
                // A session that errored may be wedged; start the next attempt fresh
                lease.discard().await;
                Attempt::Failed(e)
            }
            Err(_) => {
                metrics::record_browser_attempt("timeout");
                debug!(
                    url = %url,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "Browser render timed out"
                );
                lease.abandon().await;
                Attempt::Timeout
            }
        }
    }
}

#[async_trait]
impl<F: SessionFactory> Crawler for PooledBrowserCrawler<F> {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn crawl_one(&self, url: &str) -> Result<Option<String>, CrawlError> {
        let page = retry_attempts(&self.retry, url, || self.attempt(url)).await;

        match &page {
            Some(_) => metrics::record_fetch(Self::NAME, "success"),
            None => {
                warn!(url = %url, attempts = self.retry.max_attempts, "Browser fetch gave up");
                metrics::record_fetch(Self::NAME, "error");
            }
        }

        Ok(page)
    }
}
