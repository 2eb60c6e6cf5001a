use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::Config;
use crate::coordinator::{balancer_router, serve, shutdown_signal, BalancerState, CrawlDelegator};

/// Build the delegator from the configured endpoint list and addresses file
pub fn build_delegator(config: &Config) -> Result<CrawlDelegator> {
    config
        .validate_balancer()
        .context("Invalid balancer configuration")?;
    let endpoints = config.resolve_endpoints()?;

    CrawlDelegator::new(&endpoints, config.balancer.failure_policy)
        .context("Failed to create crawl delegator")
}

/// Run the load balancer until Ctrl-C
pub async fn balancer(config: Config, bind: Option<String>) -> Result<()> {
    let delegator = build_delegator(&config)?;
    let bind = bind.unwrap_or_else(|| config.balancer.bind_address.clone());

    println!("Starting load balancer");
    println!("======================");
    println!("  Bind: {bind}");
    println!("  Failure policy: {:?}", delegator.policy());
    for (shard, endpoint) in delegator.endpoints().iter().enumerate() {
        println!("  Shard {shard}: {endpoint}");
    }
    println!();

    tracing::info!(
        bind = %bind,
        shards = delegator.shards(),
        "Load balancer starting"
    );

    let state = BalancerState::new(Arc::new(delegator));
    serve(balancer_router(state), &bind, shutdown_signal())
        .await
        .context("Load balancer server failed")
}
