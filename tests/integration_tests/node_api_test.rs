//! Crawler node HTTP API served on a local port

use super::fixtures::{json_map, ARTICLE_URL, SAMPLE_ARTICLE_HTML, SAMPLE_SPA_HTML, SPA_URL};
use crate::common::{spawn_router, StaticCrawler};
use fleetcrawl::coordinator::{node_router, NodeState};
use fleetcrawl::ProcessedPage;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

async fn start_node() -> (String, Arc<StaticCrawler>, Arc<StaticCrawler>) {
    let direct = Arc::new(StaticCrawler::new(
        "direct",
        &[(ARTICLE_URL, SAMPLE_ARTICLE_HTML)],
    ));
    let browser = Arc::new(StaticCrawler::new("browser", &[(SPA_URL, SAMPLE_SPA_HTML)]));
    let state = NodeState::new(direct.clone(), browser.clone());
    let base = spawn_router(node_router(state)).await;
    (base, direct, browser)
}

async fn get(base: &str, route: &str, js: &str, urls: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{base}/{route}"))
        .query(&[("js", js), ("urls", urls)])
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_crawl_returns_cleaned_html() {
    let (base, _, _) = start_node().await;

    let response = get(&base, "crawl", "false", ARTICLE_URL).await;
    assert_eq!(response.status(), StatusCode::OK);

    let pages = json_map(response).await;
    let html = &pages[ARTICLE_URL];
    assert!(html.contains("Shipping update"));
    assert!(!html.contains("<script"));
    assert!(!html.contains("<iframe"));
    assert!(!html.contains("<style"));
}

#[tokio::test]
async fn test_js_flag_selects_strategy() {
    let (base, direct, browser) = start_node().await;

    let rendered = json_map(get(&base, "crawl", "true", SPA_URL).await).await;
    assert!(rendered[SPA_URL].contains("Rendered by script"));
    assert_eq!(browser.calls.load(Ordering::SeqCst), 1);
    assert_eq!(direct.calls.load(Ordering::SeqCst), 0);

    // The direct strategy has never seen the SPA
    let plain = json_map(get(&base, "crawl", "false", SPA_URL).await).await;
    assert!(plain.is_empty());
    assert_eq!(direct.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_urls_are_omitted() {
    let (base, _, _) = start_node().await;
    let urls = format!("{ARTICLE_URL};http://gone.example/");

    let pages = json_map(get(&base, "crawl", "false", &urls).await).await;

    assert_eq!(pages.len(), 1);
    assert!(pages.contains_key(ARTICLE_URL));
}

#[tokio::test]
async fn test_crawl_processed_extracts_structure() {
    let (base, _, _) = start_node().await;

    let response = get(&base, "crawl_processed", "false", ARTICLE_URL).await;
    assert_eq!(response.status(), StatusCode::OK);

    let pages: HashMap<String, ProcessedPage> = response.json().await.unwrap();
    let page = &pages[ARTICLE_URL];
    assert_eq!(page.title, "Fleet Weekly");
    assert_eq!(page.h1, vec!["Shipping update"]);
    assert_eq!(page.h2, vec!["Changes", "Known issues"]);
    assert!(page.content.contains("Browser sessions are now pooled."));
    assert!(!page.content.contains("tracker"));
}

#[tokio::test]
async fn test_empty_url_list_is_bad_request() {
    let (base, direct, _) = start_node().await;

    let response = get(&base, "crawl", "false", "").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body.get("category").is_none());
    assert_eq!(direct.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_crawler_failure_is_server_error() {
    let direct = Arc::new(StaticCrawler::failing("direct"));
    let browser = Arc::new(StaticCrawler::echo("browser"));
    let base = spawn_router(node_router(NodeState::new(direct, browser))).await;

    let response = get(&base, "crawl", "false", ARTICLE_URL).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains(ARTICLE_URL));
    assert_eq!(body["category"], "other");
    assert_eq!(body["recoverable"], true);
}

#[tokio::test]
async fn test_health_reports_node_role() {
    let (base, _, _) = start_node().await;

    let body: serde_json::Value = reqwest::get(format!("{base}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["role"], "node");
}

#[tokio::test]
async fn test_response_keys_match_requested_urls() {
    let state = NodeState::new(
        Arc::new(StaticCrawler::echo("direct")),
        Arc::new(StaticCrawler::echo("browser")),
    );
    let base = spawn_router(node_router(state)).await;

    let pages = json_map(get(&base, "crawl", "false", " http://a.example/ ;http://b.example/").await).await;

    let mut keys: Vec<&str> = pages.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec![" http://a.example/ ", "http://b.example/"]);
}
