//! HTTP API of the crawler node and the load balancer
//!
//! Both roles expose the same crawl routes, so a balancer is a drop-in
//! replacement for a single node:
//!
//! - `GET /crawl?js=<bool>&urls=<a;b;c>` returns a JSON object URL -> HTML
//! - `GET /crawl_processed?js=<bool>&urls=<a;b;c>` returns URL -> processed page
//! - `GET /health` and `GET /metrics`

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use super::delegator::CrawlDelegator;
use crate::crawler::Crawler;
use crate::error::{Error, ErrorCategory, FleetErrorTrait};
use crate::metrics;
use crate::models::{CrawlQuery, PageMap, ProcessedMap};
use crate::parser::HtmlProcessor;

// ============================================================================
// Response Types
// ============================================================================

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,

    /// Error category label, present for crawl failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,

    /// Whether repeating the request may succeed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            category: None,
            recoverable: None,
        }
    }

    /// Response body describing a crawl failure
    pub fn from_error(err: &Error) -> Self {
        Self {
            success: false,
            error: err.to_string(),
            category: Some(err.category().as_str()),
            recoverable: Some(err.is_recoverable()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub role: String,
    pub version: String,
    pub uptime_secs: u64,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

/// Map a crawl failure to its HTTP response and count it
///
/// Remote and dispatch failures answer 502, local failures 500.
fn crawl_failure(route: &str, err: Error) -> Response {
    let category = err.category();
    metrics::record_request_error(route, category);

    let status = match category {
        ErrorCategory::Network | ErrorCategory::Dispatch => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse::from_error(&err))).into_response()
}

fn missing_urls() -> Response {
    error_response(StatusCode::BAD_REQUEST, "Query parameter 'urls' is empty")
}

// ============================================================================
// Crawler Node
// ============================================================================

/// Shared state of a crawler node
#[derive(Clone)]
pub struct NodeState {
    /// Strategy used when `js=false`
    pub direct: Arc<dyn Crawler>,

    /// Strategy used when `js=true`
    pub browser: Arc<dyn Crawler>,

    /// Post-processing of fetched markup
    pub processor: Arc<HtmlProcessor>,

    /// Server start time
    pub start_time: Instant,
}

impl NodeState {
    pub fn new(direct: Arc<dyn Crawler>, browser: Arc<dyn Crawler>) -> Self {
        Self {
            direct,
            browser,
            processor: Arc::new(HtmlProcessor::new()),
            start_time: Instant::now(),
        }
    }

    fn crawler(&self, render_js: bool) -> &dyn Crawler {
        if render_js {
            self.browser.as_ref()
        } else {
            self.direct.as_ref()
        }
    }
}

/// Create the crawler node router
pub fn node_router(state: NodeState) -> Router {
    Router::new()
        .route("/crawl", get(node_crawl))
        .route("/crawl_processed", get(node_crawl_processed))
        .route("/health", get(node_health))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

async fn fetch_pages(
    state: &NodeState,
    route: &str,
    query: &CrawlQuery,
) -> Result<PageMap, Response> {
    let urls = query.url_list();
    if urls.is_empty() {
        return Err(missing_urls());
    }

    let crawler = state.crawler(query.js);
    crawler.crawl_many(&urls).await.map_err(|e| {
        error!(strategy = crawler.name(), urls = urls.len(), error = %e, "Crawl failed");
        crawl_failure(route, e.into())
    })
}

async fn node_crawl(State(state): State<NodeState>, Query(query): Query<CrawlQuery>) -> Response {
    let _timer = metrics::start_request_timer("/crawl");

    match fetch_pages(&state, "/crawl", &query).await {
        Ok(pages) => {
            let cleaned: PageMap = pages
                .into_iter()
                .map(|(url, html)| {
                    let clean = state.processor.clean(&html);
                    (url, clean)
                })
                .collect();
            Json(cleaned).into_response()
        }
        Err(response) => response,
    }
}

async fn node_crawl_processed(
    State(state): State<NodeState>,
    Query(query): Query<CrawlQuery>,
) -> Response {
    let _timer = metrics::start_request_timer("/crawl_processed");

    match fetch_pages(&state, "/crawl_processed", &query).await {
        Ok(pages) => {
            let processed: ProcessedMap = pages
                .into_iter()
                .map(|(url, html)| {
                    let page = state.processor.process(&html);
                    (url, page)
                })
                .collect();
            Json(processed).into_response()
        }
        Err(response) => response,
    }
}

async fn node_health(State(state): State<NodeState>) -> impl IntoResponse {
    Json(health("node", state.start_time))
}

// ============================================================================
// Load Balancer
// ============================================================================

/// Shared state of the load balancer
#[derive(Clone)]
pub struct BalancerState {
    pub delegator: Arc<CrawlDelegator>,

    /// Server start time
    pub start_time: Instant,
}

impl BalancerState {
    pub fn new(delegator: Arc<CrawlDelegator>) -> Self {
        Self {
            delegator,
            start_time: Instant::now(),
        }
    }
}

/// Create the load balancer router
pub fn balancer_router(state: BalancerState) -> Router {
    Router::new()
        .route("/crawl", get(balancer_crawl))
        .route("/crawl_processed", get(balancer_crawl_processed))
        .route("/health", get(balancer_health))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
}

async fn balancer_crawl(
    State(state): State<BalancerState>,
    Query(query): Query<CrawlQuery>,
) -> Response {
    let _timer = metrics::start_request_timer("/crawl");

    let urls = query.url_list();
    if urls.is_empty() {
        return missing_urls();
    }

    match state.delegator.crawl(query.js, &urls).await {
        Ok(pages) => Json(pages).into_response(),
        Err(e) => {
            error!(urls = urls.len(), error = %e, "Batch crawl failed");
            crawl_failure("/crawl", e.into())
        }
    }
}

async fn balancer_crawl_processed(
    State(state): State<BalancerState>,
    Query(query): Query<CrawlQuery>,
) -> Response {
    let _timer = metrics::start_request_timer("/crawl_processed");

    let urls = query.url_list();
    if urls.is_empty() {
        return missing_urls();
    }

    match state.delegator.crawl_processed(query.js, &urls).await {
        Ok(pages) => Json(pages).into_response(),
        Err(e) => {
            error!(urls = urls.len(), error = %e, "Processed batch crawl failed");
            crawl_failure("/crawl_processed", e.into())
        }
    }
}

async fn balancer_health(State(state): State<BalancerState>) -> impl IntoResponse {
    Json(health("balancer", state.start_time))
}

// ============================================================================
// Shared Handlers
// ============================================================================

fn health(role: &str, start_time: Instant) -> HealthResponse {
    HealthResponse {
        status: "healthy".to_string(),
        role: role.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: start_time.elapsed().as_secs(),
    }
}

async fn metrics_endpoint() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
