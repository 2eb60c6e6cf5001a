//! Cluster-level load balancing of crawl batches
//!
//! A batch is split into shards by a stable hash of each URL, one shard per
//! configured endpoint. Shards are dispatched concurrently (at most one task per
//! endpoint in flight at any time) and their disjoint results are merged.
//!
//! With [`FailurePolicy::FailFast`] the first failing shard aborts the rest of
//! the batch and no partial result is returned. [`FailurePolicy::Partial`] keeps
//! whatever the healthy shards produced. The `*_report` methods always return
//! the partial result together with a per-shard failure list.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::client::RemoteCrawlerClient;
use crate::error::{ErrorCategory, FleetErrorTrait};
use crate::metrics;
use crate::models::{PageMap, ProcessedMap, ProcessedPage};
use crate::utils::error::{ClientError, DelegatorError};

/// What a batch returns when one of its shards fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole batch on the first failing shard
    #[default]
    FailFast,

    /// Return the pages of the shards that succeeded
    Partial,
}

/// Shard owning `url` among `shards` endpoints
///
/// The first eight bytes of the URL's SHA-256 digest, read big-endian, modulo
/// the shard count. The result only depends on the URL text and the count, so
/// it is identical across processes, platforms and releases.
pub fn shard_for(url: &str, shards: usize) -> usize {
    let shards = shards.max(1) as u64;
    let digest = Sha256::digest(url.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % shards) as usize
}

/// Group distinct URLs by shard, keeping first-seen order within each shard
///
/// Shards without URLs are omitted.
pub fn partition(urls: &[String], shards: usize) -> BTreeMap<usize, Vec<String>> {
    let mut seen = HashSet::with_capacity(urls.len());
    let mut batches: BTreeMap<usize, Vec<String>> = BTreeMap::new();

    for url in urls {
        if seen.insert(url.as_str()) {
            batches
                .entry(shard_for(url, shards))
                .or_default()
                .push(url.clone());
        }
    }

    batches
}

/// One shard that did not contribute to a batch result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShardFailure {
    pub shard: usize,
    pub endpoint: String,
    pub reason: String,
}

/// Merged result of a batch plus the shards that failed
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    pub pages: HashMap<String, T>,
    pub failures: Vec<ShardFailure>,
}

impl<T> BatchOutcome<T> {
    fn empty() -> Self {
        Self {
            pages: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// True when every shard contributed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

fn log_partial<T>(outcome: BatchOutcome<T>) -> HashMap<String, T> {
    for failure in &outcome.failures {
        warn!(
            shard = failure.shard,
            endpoint = %failure.endpoint,
            reason = %failure.reason,
            "Shard failed, returning partial batch"
        );
    }
    outcome.pages
}

/// Aborts outstanding shard tasks when a dispatch ends early
struct AbortOnDrop(Vec<AbortHandle>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Load balancer over a fixed list of crawler nodes
///
/// The endpoint list order defines shard ids; changing it reshuffles every
/// URL's assignment.
#[derive(Debug)]
pub struct CrawlDelegator {
    clients: Vec<RemoteCrawlerClient>,
    permits: Arc<Semaphore>,
    policy: FailurePolicy,
}

impl CrawlDelegator {
    /// Create a delegator over `endpoints`, sharing one HTTP connection pool
    pub fn new(endpoints: &[String], policy: FailurePolicy) -> Result<Self, DelegatorError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| DelegatorError::InvalidEndpoint(ClientError::InitError(e.to_string())))?;

        let clients = endpoints
            .iter()
            .map(|endpoint| RemoteCrawlerClient::with_client(endpoint, http_client.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(DelegatorError::InvalidEndpoint)?;

        Self::from_clients(clients, policy)
    }

    /// Create a delegator from prepared clients; list index is the shard id
    pub fn from_clients(
        clients: Vec<RemoteCrawlerClient>,
        policy: FailurePolicy,
    ) -> Result<Self, DelegatorError> {
        if clients.is_empty() {
            return Err(DelegatorError::NoEndpoints);
        }

        info!(
            endpoints = clients.len(),
            policy = ?policy,
            "Crawl delegator initialized"
        );

        Ok(Self {
            permits: Arc::new(Semaphore::new(clients.len())),
            clients,
            policy,
        })
    }

    /// Number of shards (endpoints)
    pub fn shards(&self) -> usize {
        self.clients.len()
    }

    /// Endpoint base addresses in shard order
    pub fn endpoints(&self) -> Vec<&str> {
        self.clients.iter().map(RemoteCrawlerClient::base_url).collect()
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Crawl a batch across the fleet, returning raw pages
    pub async fn crawl(&self, render_js: bool, urls: &[String]) -> Result<PageMap, DelegatorError> {
        let outcome = self.dispatch_raw(render_js, urls, self.fail_fast()).await?;
        Ok(log_partial(outcome))
    }

    /// Crawl a batch across the fleet, returning processed pages
    pub async fn crawl_processed(
        &self,
        render_js: bool,
        urls: &[String],
    ) -> Result<ProcessedMap, DelegatorError> {
        let outcome = self
            .dispatch_processed(render_js, urls, self.fail_fast())
            .await?;
        Ok(log_partial(outcome))
    }

    /// Crawl a batch and report per-shard failures alongside the partial result
    pub async fn crawl_report(
        &self,
        render_js: bool,
        urls: &[String],
    ) -> Result<BatchOutcome<String>, DelegatorError> {
        self.dispatch_raw(render_js, urls, false).await
    }

    /// Processed-page variant of [`CrawlDelegator::crawl_report`]
    pub async fn crawl_processed_report(
        &self,
        render_js: bool,
        urls: &[String],
    ) -> Result<BatchOutcome<ProcessedPage>, DelegatorError> {
        self.dispatch_processed(render_js, urls, false).await
    }

    fn fail_fast(&self) -> bool {
        self.policy == FailurePolicy::FailFast
    }

    async fn dispatch_raw(
        &self,
        render_js: bool,
        urls: &[String],
        fail_fast: bool,
    ) -> Result<BatchOutcome<String>, DelegatorError> {
        self.dispatch(urls, fail_fast, move |client, batch| async move {
            client.crawl(render_js, &batch).await
        })
        .await
    }

    async fn dispatch_processed(
        &self,
        render_js: bool,
        urls: &[String],
        fail_fast: bool,
    ) -> Result<BatchOutcome<ProcessedPage>, DelegatorError> {
        self.dispatch(urls, fail_fast, move |client, batch| async move {
            client.crawl_processed(render_js, &batch).await
        })
        .await
    }

    /// Run `call` once per non-empty shard and merge the results
    async fn dispatch<T, F, Fut>(
        &self,
        urls: &[String],
        fail_fast: bool,
        call: F,
    ) -> Result<BatchOutcome<T>, DelegatorError>
    where
        T: Send + 'static,
        F: Fn(RemoteCrawlerClient, Vec<String>) -> Fut,
        Fut: Future<Output = Result<HashMap<String, T>, ClientError>> + Send + 'static,
    {
        let batches = partition(urls, self.shards());
        if batches.is_empty() {
            return Ok(BatchOutcome::empty());
        }

        info!(
            urls = urls.len(),
            shards = batches.len(),
            fail_fast = fail_fast,
            "Dispatching crawl batch"
        );

        let mut pending = FuturesUnordered::new();
        let mut guard = AbortOnDrop(Vec::with_capacity(batches.len()));

        for (shard, batch) in batches {
            let client = self.clients[shard].clone();
            let endpoint = client.base_url().to_string();
            let permits = Arc::clone(&self.permits);
            let request = call(client, batch);

            let handle = tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| ClientError::InitError(e.to_string()))?;
                request.await
            });
            guard.0.push(handle.abort_handle());
            pending.push(async move { (shard, endpoint, handle.await) });
        }

        let mut outcome = BatchOutcome::empty();

        while let Some((shard, endpoint, joined)) = pending.next().await {
            let (category, reason) = match joined {
                Ok(Ok(pages)) => {
                    metrics::record_shard_dispatch(None);
                    debug!(shard = shard, endpoint = %endpoint, pages = pages.len(), "Shard completed");
                    outcome.pages.extend(pages);
                    continue;
                }
                Ok(Err(source)) => {
                    let category = source.category();
                    if fail_fast {
                        metrics::record_shard_dispatch(Some(category));
                        warn!(shard = shard, endpoint = %endpoint, error = %source, "Shard failed, aborting batch");
                        return Err(DelegatorError::ShardFailed {
                            shard,
                            endpoint,
                            source,
                        });
                    }
                    (category, source.to_string())
                }
                Err(join_error) => {
                    if fail_fast {
                        metrics::record_shard_dispatch(Some(ErrorCategory::Dispatch));
                        warn!(shard = shard, endpoint = %endpoint, error = %join_error, "Shard task failed, aborting batch");
                        return Err(DelegatorError::TaskFailed {
                            shard,
                            endpoint,
                            reason: join_error.to_string(),
                        });
                    }
                    (ErrorCategory::Dispatch, join_error.to_string())
                }
            };

            metrics::record_shard_dispatch(Some(category));
            outcome.failures.push(ShardFailure {
                shard,
                endpoint,
                reason,
            });
        }

        outcome.failures.sort_by_key(|f| f.shard);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shard_for_is_stable() {
        // Pinned values guard against accidental changes of the hash scheme
        assert_eq!(shard_for("http://example.com/", 1_000_003), 126_450);
        assert_eq!(shard_for("https://www.rust-lang.org/", 1_000_003), 840_775);
        assert_eq!(shard_for("http://example.com/", 2), 1);
        assert_eq!(shard_for("c", 3), 2);
        assert_eq!(shard_for("anything", 1), 0);
        assert_eq!(shard_for("anything", 0), 0);
    }

    #[test]
    fn test_partition_dedups_and_keeps_order() {
        let input = urls(&["u1", "u2", "u3", "u1", "u4", "u5", "u2"]);
        let batches = partition(&input, 3);

        let total: usize = batches.values().map(Vec::len).sum();
        assert_eq!(total, 5);

        for (shard, batch) in &batches {
            assert!(!batch.is_empty());
            for url in batch {
                assert_eq!(shard_for(url, 3), *shard);
            }
            let positions: Vec<usize> = batch
                .iter()
                .map(|u| input.iter().position(|x| x == u).unwrap())
                .collect();
            let sorted = {
                let mut p = positions.clone();
                p.sort_unstable();
                p
            };
            assert_eq!(positions, sorted);
        }
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition(&[], 4).is_empty());
    }

    #[test]
    fn test_no_endpoints_rejected() {
        assert!(matches!(
            CrawlDelegator::new(&[], FailurePolicy::FailFast),
            Err(DelegatorError::NoEndpoints)
        ));
        assert!(matches!(
            CrawlDelegator::new(&urls(&["::bad::"]), FailurePolicy::FailFast),
            Err(DelegatorError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_dispatches_nothing() {
        // Unroutable address: any dispatch would fail
        let delegator =
            CrawlDelegator::new(&urls(&["http://127.0.0.1:9"]), FailurePolicy::FailFast).unwrap();
        assert!(delegator.crawl(false, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_on_unreachable_endpoint() {
        let delegator =
            CrawlDelegator::new(&urls(&["http://127.0.0.1:9"]), FailurePolicy::FailFast).unwrap();
        let err = delegator
            .crawl(false, &urls(&["http://a.com"]))
            .await
            .unwrap_err();
        assert!(matches!(err, DelegatorError::ShardFailed { shard: 0, .. }));
    }

    #[tokio::test]
    async fn test_report_lists_failed_shards() {
        let delegator =
            CrawlDelegator::new(&urls(&["http://127.0.0.1:9"]), FailurePolicy::FailFast).unwrap();
        let outcome = delegator
            .crawl_report(true, &urls(&["http://a.com", "http://b.com"]))
            .await
            .unwrap();
        assert!(outcome.pages.is_empty());
        assert!(!outcome.is_complete());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].endpoint, "http://127.0.0.1:9/");
    }

    proptest! {
        #[test]
        fn prop_shard_in_range_and_deterministic(url in ".{1,200}", n in 1usize..64) {
            let shard = shard_for(&url, n);
            prop_assert!(shard < n);
            prop_assert_eq!(shard, shard_for(&url, n));
        }

        #[test]
        fn prop_partition_is_exact_cover(
            list in proptest::collection::vec("[a-z]{1,8}", 0..50),
            n in 1usize..8,
        ) {
            let batches = partition(&list, n);

            let mut covered: Vec<&String> = batches.values().flatten().collect();
            covered.sort();
            let mut expected: Vec<&String> = list.iter().collect::<HashSet<_>>().into_iter().collect();
            expected.sort();
            prop_assert_eq!(covered, expected);

            for (shard, batch) in &batches {
                prop_assert!(*shard < n);
                for url in batch {
                    prop_assert_eq!(shard_for(url, n), *shard);
                }
            }
        }
    }
}
