//! Entry points of the command-line subcommands

pub mod balancer;
pub mod crawl;
pub mod node;

// Re-export command functions for convenience
pub use balancer::{balancer, build_delegator};
pub use crawl::{crawl, CrawlParams};
pub use node::{node, NodeStack};
