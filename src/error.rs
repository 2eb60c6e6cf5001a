//! Unified error handling for the fleetcrawl crate
//!
//! Domain errors live in [`crate::utils::error`]. This module classifies them
//! and wraps the ones that reach an HTTP route into a single `Error` enum.
//!
//! # Architecture
//!
//! - [`FleetErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Route-level error wrapping crawl and dispatch failures
//!
//! # Usage
//!
//! ```rust,ignore
//! use fleetcrawl::error::{Error, FleetErrorTrait};
//!
//! fn label(err: &Error) -> &'static str {
//!     err.category().as_str()
//! }
//! ```

use thiserror::Error;

pub use crate::utils::error::{
    CacheError, ClientError, ConfigError, CrawlError, DelegatorError, PoolError,
};

/// Common trait for all fleetcrawl error types
pub trait FleetErrorTrait: std::error::Error {
    /// Check if this error is recoverable (a later attempt may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network and remote node errors
    Network,
    /// Cache store and I/O errors
    Storage,
    /// Headless browser errors
    Browser,
    /// Configuration and validation errors
    Config,
    /// Cluster dispatch errors
    Dispatch,
    /// Local task failures and anything else
    Other,
}

impl ErrorCategory {
    /// Short label, used as a metrics dimension
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Storage => "storage",
            Self::Browser => "browser",
            Self::Config => "config",
            Self::Dispatch => "dispatch",
            Self::Other => "other",
        }
    }
}

impl FleetErrorTrait for CrawlError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::ClientBuild(_) => false,
            Self::Task { .. } => true,
            Self::Cache(e) => e.is_recoverable(),
            Self::Pool(e) => e.is_recoverable(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ClientBuild(_) => ErrorCategory::Config,
            Self::Task { .. } => ErrorCategory::Other,
            Self::Cache(e) => e.category(),
            Self::Pool(e) => e.category(),
        }
    }
}

impl FleetErrorTrait for CacheError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Database(rusqlite::Error::SqliteFailure(_, _)))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidNamespace(_) => ErrorCategory::Config,
            _ => ErrorCategory::Storage,
        }
    }
}

impl FleetErrorTrait for PoolError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Launch(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Browser
    }
}

impl FleetErrorTrait for ClientError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::NetworkError(_) => true,
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidEndpoint { .. } | Self::InitError(_) | Self::ParseError(_) => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidEndpoint { .. } | Self::InitError(_) => ErrorCategory::Config,
            _ => ErrorCategory::Network,
        }
    }
}

impl FleetErrorTrait for DelegatorError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::NoEndpoints | Self::InvalidEndpoint(_) => false,
            Self::ShardFailed { source, .. } => source.is_recoverable(),
            Self::TaskFailed { .. } => true,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NoEndpoints | Self::InvalidEndpoint(_) => ErrorCategory::Config,
            _ => ErrorCategory::Dispatch,
        }
    }
}

/// Error surfaced by a crawl route of the node or balancer
///
/// The HTTP layer answers with a status and an [`ErrorCategory`] label derived
/// from the wrapped domain error.
#[derive(Error, Debug)]
pub enum Error {
    /// Single-node crawl errors
    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    /// Cluster dispatch errors
    #[error("Delegator error: {0}")]
    Delegator(#[from] DelegatorError),
}

impl FleetErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Crawl(e) => e.is_recoverable(),
            Self::Delegator(e) => e.is_recoverable(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Crawl(e) => e.category(),
            Self::Delegator(e) => e.category(),
        }
    }
}
