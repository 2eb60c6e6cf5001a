//! Retry utilities for flaky external resources
//!
//! This module provides a fixed-budget attempt loop. Each attempt ends in one of
//! three outcomes (success, timeout, failure); timeouts and failures both consume
//! the budget, and an exhausted budget yields `None` rather than an error.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of attempts for a browser fetch
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Fixed pause between two consecutive attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with a custom attempt budget and delay
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// The attempt produced a value
    Success(T),

    /// The attempt ran past its deadline
    Timeout,

    /// The attempt failed with an error
    Failed(anyhow::Error),
}

/// Run `operation` until it succeeds or the attempt budget is spent
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `label` - What is being attempted, used in log fields
/// * `operation` - Async operation producing an [`Attempt`]
///
/// # Returns
///
/// `Some(T)` from the first successful attempt, `None` once every attempt
/// timed out or failed.
///
/// # Example
///
/// ```no_run
/// use fleetcrawl::utils::retry::{retry_attempts, Attempt, RetryConfig};
///
/// # async fn demo() {
/// let config = RetryConfig::default();
/// let page = retry_attempts(&config, "https://example.com", || async {
///     Attempt::Success("<html></html>".to_string())
/// })
/// .await;
/// assert!(page.is_some());
/// # }
/// ```
pub async fn retry_attempts<T, F, Fut>(config: &RetryConfig, label: &str, operation: F) -> Option<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            debug!(
                target_label = label,
                attempt = attempt,
                delay_ms = config.delay.as_millis() as u64,
                "Retrying after delay"
            );
            tokio::time::sleep(config.delay).await;
        }

        match operation().await {
            Attempt::Success(value) => {
                if attempt > 1 {
                    debug!(target_label = label, attempt = attempt, "Succeeded after retry");
                }
                return Some(value);
            }
            Attempt::Timeout => {
                debug!(
                    target_label = label,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    "Attempt timed out"
                );
            }
            Attempt::Failed(e) => {
                warn!(
                    target_label = label,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    error = %e,
                    "Attempt failed"
                );
            }
        }
    }

    warn!(
        target_label = label,
        max_attempts = config.max_attempts,
        "Giving up after exhausting all attempts"
    );
    None
}
