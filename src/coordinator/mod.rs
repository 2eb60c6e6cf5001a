//! Cluster coordination: the load balancer and the HTTP surface of both roles
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────┐
//!   GET /crawl ────▶ │    Load balancer     │
//!                    │   (CrawlDelegator)   │
//!                    └──────────┬───────────┘
//!            shard = hash(url) mod N
//!          ┌────────────────────┼────────────────────┐
//!          ▼                    ▼                    ▼
//!   ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!   │   Node 0    │      │   Node 1    │      │   Node N-1  │
//!   │ direct/js + │      │ direct/js + │      │ direct/js + │
//!   │    cache    │      │    cache    │      │    cache    │
//!   └─────────────┘      └─────────────┘      └─────────────┘
//! ```
//!
//! # Modules
//!
//! - `client`: RemoteCrawlerClient for one node
//! - `delegator`: sharding, concurrent dispatch and result merging
//! - `api`: axum routers for the node and balancer roles
//! - `server`: bind/serve with graceful shutdown

pub mod api;
pub mod client;
pub mod delegator;
pub mod server;

pub use api::{balancer_router, node_router, BalancerState, NodeState};
pub use client::RemoteCrawlerClient;
pub use delegator::{
    partition, shard_for, BatchOutcome, CrawlDelegator, FailurePolicy, ShardFailure,
};
pub use server::{serve, shutdown_signal, ServerError};
