//! Integration tests module
//!
//! End-to-end tests of the fleet: crawler node routers served on local
//! ports, a balancer sharding batches over them, and the node stack wired to
//! real cache files.

pub mod cluster_test;
pub mod fixtures;
pub mod node_api_test;
