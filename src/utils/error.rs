//! Error types for the fleetcrawl crawler
//!
//! This module defines the domain-specific error types used throughout the crate.
//! [`crate::error`] classifies them and wraps the ones that reach an HTTP route.

use thiserror::Error;

/// Errors raised by the single-node crawler stack
///
/// Timeouts and transport failures of an individual fetch are not errors:
/// they surface as an absent page. Only failures that invalidate the whole
/// invocation end up here.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// A spawned fetch task panicked or was cancelled
    #[error("Fetch task for {url} failed: {reason}")]
    Task { url: String, reason: String },

    /// The page cache failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The browser session pool failed
    #[error("Browser pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Errors raised by the on-disk page cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Cache directory could not be created
    #[error("Failed to prepare cache directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid namespace name
    #[error("Invalid cache namespace: {0}")]
    InvalidNamespace(String),
}

/// Errors raised by the browser session pool
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool has been closed
    #[error("Session pool is closed")]
    Closed,

    /// A new session could not be launched
    #[error("Failed to launch browser session: {0}")]
    Launch(String),
}

/// Errors raised when talking to a remote crawler node
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Endpoint base address is not a valid URL
    #[error("Invalid endpoint address {address}: {reason}")]
    InvalidEndpoint { address: String, reason: String },

    /// Client construction failed
    #[error("Initialization error: {0}")]
    InitError(String),

    /// Transport failure (connection refused, reset, ...)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The node answered with a non-2xx status
    #[error("HTTP error ({status}): {message}")]
    HttpError { status: u16, message: String },

    /// The body was not the expected JSON object
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Errors raised by the cluster-level delegator
#[derive(Error, Debug)]
pub enum DelegatorError {
    /// No backend endpoints were configured
    #[error("No crawler endpoints configured")]
    NoEndpoints,

    /// An endpoint address could not be used
    #[error("Invalid crawler endpoint: {0}")]
    InvalidEndpoint(#[source] ClientError),

    /// A shard's dispatch failed and the batch was aborted
    #[error("Batch crawl failed: shard {shard} ({endpoint}): {source}")]
    ShardFailed {
        shard: usize,
        endpoint: String,
        #[source]
        source: ClientError,
    },

    /// A dispatch task panicked or was cancelled
    #[error("Batch crawl failed: shard {shard} ({endpoint}) task error: {reason}")]
    TaskFailed {
        shard: usize,
        endpoint: String,
        reason: String,
    },
}

/// Configuration errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A required field is missing
    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
