//! Prometheus metrics for fleetcrawl nodes and the load balancer
//!
//! This module provides metrics tracking for:
//! - Crawler node: fetch outcomes per strategy, cache hits/misses/writes,
//!   browser attempts and leased sessions
//! - Load balancer: shard dispatch outcomes, failures labelled by error category
//! - Both: HTTP request duration and failed requests per route
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter_vec, Encoder, Gauge,
    HistogramVec, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

use crate::error::ErrorCategory;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all crawler node metrics
struct NodeMetrics {
    fetches: IntCounterVec,
    cache_events: IntCounterVec,
    browser_attempts: IntCounterVec,
    sessions_leased: Gauge,
}

/// Container for load balancer and shared HTTP metrics
struct BalancerMetrics {
    shard_dispatches: IntCounterVec,
    request_duration: HistogramVec,
    request_errors: IntCounterVec,
}

static NODE_METRICS: OnceLock<NodeMetrics> = OnceLock::new();

static BALANCER_METRICS: OnceLock<BalancerMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// This function should be called once at application startup.
/// Subsequent calls are no-ops.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = fleetcrawl::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
///     // Application can continue without metrics
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let node = NodeMetrics {
        fetches: register_int_counter_vec!(
            "fleetcrawl_fetches_total",
            "Page fetches by strategy and outcome",
            &["strategy", "outcome"]
        )?,
        cache_events: register_int_counter_vec!(
            "fleetcrawl_cache_events_total",
            "Page cache hits, misses and writes by namespace",
            &["namespace", "event"]
        )?,
        browser_attempts: register_int_counter_vec!(
            "fleetcrawl_browser_attempts_total",
            "Browser render attempts by outcome",
            &["outcome"]
        )?,
        sessions_leased: register_gauge!(
            "fleetcrawl_browser_sessions_leased",
            "Browser sessions currently leased from the pool"
        )?,
    };

    let balancer = BalancerMetrics {
        shard_dispatches: register_int_counter_vec!(
            "fleetcrawl_shard_dispatches_total",
            "Shard dispatches to crawler nodes by outcome",
            &["outcome"]
        )?,
        request_duration: register_histogram_vec!(
            "fleetcrawl_request_duration_seconds",
            "HTTP request duration in seconds",
            &["route"],
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
        )?,
        request_errors: register_int_counter_vec!(
            "fleetcrawl_request_errors_total",
            "Failed crawl requests by route and error category",
            &["route", "category"]
        )?,
    };

    NODE_METRICS
        .set(node)
        .map_err(|_| "Node metrics already initialized")?;
    BALANCER_METRICS
        .set(balancer)
        .map_err(|_| "Balancer metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    NODE_METRICS.get().is_some() && BALANCER_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one fetch outcome (`success`, `timeout`, `error`)
pub fn record_fetch(strategy: &str, outcome: &str) {
    if let Some(m) = NODE_METRICS.get() {
        m.fetches.with_label_values(&[strategy, outcome]).inc();
    }
}

/// Record cache hits and misses of one lookup
pub fn record_cache_lookup(namespace: &str, hits: usize, misses: usize) {
    let Some(m) = NODE_METRICS.get() else {
        return;
    };

    if hits > 0 {
        m.cache_events
            .with_label_values(&[namespace, "hit"])
            .inc_by(hits as u64);
    }
    if misses > 0 {
        m.cache_events
            .with_label_values(&[namespace, "miss"])
            .inc_by(misses as u64);
    }
}

/// Record pages written to the cache
pub fn record_cache_writes(namespace: &str, count: usize) {
    if count == 0 {
        return;
    }
    if let Some(m) = NODE_METRICS.get() {
        m.cache_events
            .with_label_values(&[namespace, "write"])
            .inc_by(count as u64);
    }
}

/// Record one browser render attempt (`success`, `timeout`, `error`)
pub fn record_browser_attempt(outcome: &str) {
    if let Some(m) = NODE_METRICS.get() {
        m.browser_attempts.with_label_values(&[outcome]).inc();
    }
}

/// Update the number of leased browser sessions
pub fn set_sessions_leased(leased: usize) {
    if let Some(m) = NODE_METRICS.get() {
        m.sessions_leased.set(leased as f64);
    }
}

/// Record a shard dispatch result
///
/// `None` is a successful dispatch; failures are labelled with their category.
pub fn record_shard_dispatch(failure: Option<ErrorCategory>) {
    if let Some(m) = BALANCER_METRICS.get() {
        let outcome = failure.map_or("success", |category| category.as_str());
        m.shard_dispatches.with_label_values(&[outcome]).inc();
    }
}

/// Record a crawl request that ended in an error response
pub fn record_request_error(route: &str, category: ErrorCategory) {
    if let Some(m) = BALANCER_METRICS.get() {
        m.request_errors
            .with_label_values(&[route, category.as_str()])
            .inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a request timer for a route
pub fn start_request_timer(route: &str) -> MetricsTimer {
    match BALANCER_METRICS.get() {
        Some(m) => MetricsTimer::new(m.request_duration.with_label_values(&[route]).start_timer()),
        None => MetricsTimer::noop(),
    }
}
