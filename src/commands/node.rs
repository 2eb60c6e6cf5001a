use anyhow::{Context, Result};
use std::sync::Arc;

use crate::cache::{CachingCrawler, PageStore};
use crate::config::{Config, NodeConfig};
use crate::coordinator::{node_router, serve, shutdown_signal, NodeState};
use crate::crawler::browser::PooledBrowserCrawler;
use crate::crawler::chrome::{ChromeConfig, ChromeSessionFactory};
use crate::crawler::direct::DirectHttpCrawler;
use crate::crawler::pool::SessionFactory;
use crate::crawler::FetchBudget;

/// Both strategies of a node, each behind its own cache namespace
pub struct NodeStack<F: SessionFactory> {
    pub direct: Arc<CachingCrawler<DirectHttpCrawler>>,
    pub browser: Arc<CachingCrawler<PooledBrowserCrawler<F>>>,
}

impl<F: SessionFactory> NodeStack<F> {
    /// Assemble the node's crawlers over a shared fetch budget
    pub fn build(config: &NodeConfig, factory: F) -> Result<Self> {
        let budget = FetchBudget::new(config.threads);

        let direct = DirectHttpCrawler::new(&config.direct, budget.clone())
            .context("Failed to create direct HTTP crawler")?;
        let direct_store = PageStore::open(
            &config.cache.dir,
            DirectHttpCrawler::NAME,
            config.direct.cache_ttl(),
        )
        .context("Failed to open direct page cache")?;

        let browser = PooledBrowserCrawler::new(factory, budget, &config.browser);
        let browser_store = PageStore::open(
            &config.cache.dir,
            PooledBrowserCrawler::<F>::NAME,
            config.browser.cache_ttl(),
        )
        .context("Failed to open browser page cache")?;

        Ok(Self {
            direct: Arc::new(CachingCrawler::new(
                direct,
                direct_store,
                config.cache.min_content_len,
            )),
            browser: Arc::new(CachingCrawler::new(
                browser,
                browser_store,
                config.cache.min_content_len,
            )),
        })
    }

    /// Router state serving `js=false` from the direct stack and `js=true` from the browser stack
    pub fn state(&self) -> NodeState {
        NodeState::new(self.direct.clone(), self.browser.clone())
    }

    /// Close the browser session pool
    pub async fn shutdown(&self) {
        self.browser.inner().shutdown().await;
    }
}

/// Run a crawler node until Ctrl-C
pub async fn node(config: Config, bind: Option<String>) -> Result<()> {
    config.validate_node().context("Invalid node configuration")?;
    let node = &config.node;
    let bind = bind.unwrap_or_else(|| node.bind_address.clone());

    println!("Starting crawler node");
    println!("=====================");
    println!("  Bind: {bind}");
    println!("  Threads: {}", node.threads);
    println!("  Browser sessions: {}", node.browser.instances);
    println!("  Cache dir: {}", node.cache.dir.display());
    println!();

    let factory = ChromeSessionFactory::new(ChromeConfig::from(&node.browser));
    let stack = NodeStack::build(node, factory)?;

    tracing::info!(
        bind = %bind,
        threads = node.threads,
        browser_sessions = node.browser.instances,
        "Crawler node starting"
    );

    let result = serve(node_router(stack.state()), &bind, shutdown_signal()).await;
    stack.shutdown().await;

    result.context("Crawler node server failed")
}
