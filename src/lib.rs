//! fleetcrawl - sharded web crawling across a fleet of nodes
//!
//! A load balancer spreads URL batches over crawler nodes by a stable hash of
//! each URL. Every node fetches pages either with plain HTTP or by rendering
//! them in pooled headless browsers, with a TTL page cache in front of both.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`coordinator`] - Load balancer, remote node client and HTTP routers
//! - [`crawler`] - Crawler trait and the direct / browser strategies
//! - [`cache`] - TTL page store and caching decorator
//! - [`parser`] - HTML cleaning and structure extraction
//! - [`models`] - Core data structures and types
//! - [`commands`] - Subcommand entry points used by the binary
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use fleetcrawl::coordinator::{CrawlDelegator, FailurePolicy};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let endpoints = vec![
//!         "http://10.0.0.1:8080".to_string(),
//!         "http://10.0.0.2:8080".to_string(),
//!     ];
//!     let delegator = CrawlDelegator::new(&endpoints, FailurePolicy::FailFast)?;
//!     let pages = delegator
//!         .crawl(false, &["https://example.com/".to_string()])
//!         .await?;
//!     println!("{} pages", pages.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod crawler;
pub mod error;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cache::{CachingCrawler, PageStore};
    pub use crate::config::Config;
    pub use crate::coordinator::{CrawlDelegator, FailurePolicy, RemoteCrawlerClient};
    pub use crate::crawler::{Crawler, FetchBudget};
    pub use crate::error::{Error, ErrorCategory, FleetErrorTrait};
    pub use crate::models::{PageMap, ProcessedPage};
}

// Direct re-exports for convenience
pub use models::{PageMap, ProcessedPage};
