//! Plain HTTP fetching without JavaScript rendering
//!
//! One shared `reqwest` client per node. Redirects are followed across hosts and
//! schemes, and in [`TlsMode::TrustAll`] certificate errors are ignored: crawled
//! sites are arbitrary third parties and a broken certificate chain should not
//! hide the page. Use [`TlsMode::Verify`] where that trade-off is unacceptable.

use async_trait::async_trait;
use reqwest::{redirect, Client};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Crawler, FetchBudget};
use crate::config::{DirectConfig, TlsMode};
use crate::metrics;
use crate::utils::error::CrawlError;

/// Fetches pages with a single HTTP GET each
#[derive(Debug, Clone)]
pub struct DirectHttpCrawler {
    client: Client,
    timeout: Duration,
    budget: FetchBudget,
}

impl DirectHttpCrawler {
    /// Strategy name and cache namespace
    pub const NAME: &'static str = "direct";

    /// Create a crawler from configuration, sharing the node's fetch budget
    pub fn new(config: &DirectConfig, budget: FetchBudget) -> Result<Self, CrawlError> {
        Ok(Self {
            client: build_client(config)?,
            timeout: config.timeout(),
            budget,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Build the HTTP client used for direct fetches
///
/// No client-level timeout is set; the per-fetch deadline is applied by the
/// caller so a timed-out fetch can be reported as absent.
pub fn build_client(config: &DirectConfig) -> Result<Client, CrawlError> {
    Client::builder()
        .user_agent(&config.user_agent)
        .redirect(redirect::Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(config.tls == TlsMode::TrustAll)
        .gzip(true)
        .build()
        .map_err(CrawlError::ClientBuild)
}

async fn fetch_body(client: &Client, url: &str) -> reqwest::Result<String> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        // Error pages are returned as-is; the cache length gate filters most of them
        debug!(url = %url, status = %status, "Non-success status from direct fetch");
    }
    response.text().await
}

#[async_trait]
impl Crawler for DirectHttpCrawler {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn crawl_one(&self, url: &str) -> Result<Option<String>, CrawlError> {
        let permit = self.budget.acquire().await?;
        let client = self.client.clone();
        let target = url.to_string();

        let mut handle = tokio::spawn(async move {
            let _permit = permit;
            fetch_body(&client, &target).await
        });

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(body))) => {
                metrics::record_fetch(Self::NAME, "success");
                Ok(Some(body))
            }
            Ok(Ok(Err(e))) => {
                warn!(url = %url, error = %e, "Direct fetch failed");
                metrics::record_fetch(Self::NAME, "error");
                Ok(None)
            }
            Ok(Err(e)) => Err(CrawlError::Task {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                handle.abort();
                debug!(
                    url = %url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Direct fetch timed out"
                );
                metrics::record_fetch(Self::NAME, "timeout");
                Ok(None)
            }
        }
    }
}
