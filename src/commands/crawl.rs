use anyhow::{Context, Result};
use serde::Serialize;

use super::balancer::build_delegator;
use crate::config::Config;
use crate::coordinator::{BatchOutcome, CrawlDelegator, FailurePolicy};
use crate::utils::dedup_urls;

/// Parameters of a one-shot batch crawl
#[derive(Debug, Clone)]
pub struct CrawlParams {
    pub urls: Vec<String>,
    pub render_js: bool,
    pub processed: bool,
}

/// Crawl one batch through the fleet and return the merged result as JSON
///
/// Follows `balancer.failure_policy`: under fail-fast any failed shard fails
/// the command. Under partial, failed shards are listed on stderr and the
/// command fails only when no shard produced pages.
pub async fn crawl(config: &Config, params: CrawlParams) -> Result<String> {
    let delegator = build_delegator(config)?;
    let urls = dedup_urls(&params.urls);

    tracing::info!(
        urls = urls.len(),
        shards = delegator.shards(),
        render_js = params.render_js,
        processed = params.processed,
        policy = ?delegator.policy(),
        "Starting one-shot crawl"
    );

    match delegator.policy() {
        FailurePolicy::FailFast => crawl_complete(&delegator, &params, &urls).await,
        FailurePolicy::Partial => crawl_partial(&delegator, &params, &urls).await,
    }
}

async fn crawl_complete(
    delegator: &CrawlDelegator,
    params: &CrawlParams,
    urls: &[String],
) -> Result<String> {
    if params.processed {
        let pages = delegator
            .crawl_processed(params.render_js, urls)
            .await
            .context("Batch crawl failed")?;
        render(&pages)
    } else {
        let pages = delegator
            .crawl(params.render_js, urls)
            .await
            .context("Batch crawl failed")?;
        render(&pages)
    }
}

async fn crawl_partial(
    delegator: &CrawlDelegator,
    params: &CrawlParams,
    urls: &[String],
) -> Result<String> {
    if params.processed {
        let outcome = delegator
            .crawl_processed_report(params.render_js, urls)
            .await?;
        report(outcome)
    } else {
        let outcome = delegator.crawl_report(params.render_js, urls).await?;
        report(outcome)
    }
}

fn report<T: Serialize>(outcome: BatchOutcome<T>) -> Result<String> {
    for failure in &outcome.failures {
        eprintln!(
            "shard {} ({}) failed: {}",
            failure.shard, failure.endpoint, failure.reason
        );
    }

    if outcome.pages.is_empty() && !outcome.failures.is_empty() {
        anyhow::bail!("All {} dispatched shards failed", outcome.failures.len());
    }

    render(&outcome.pages)
}

fn render<T: Serialize>(pages: &T) -> Result<String> {
    serde_json::to_string_pretty(pages).context("Failed to render crawl result")
}
