//! Load balancer in front of live crawler node routers

use crate::common::{spawn_router, urls_for_shards, FakeBrowser, StaticCrawler};
use fleetcrawl::commands::NodeStack;
use fleetcrawl::config::NodeConfig;
use fleetcrawl::coordinator::{
    balancer_router, node_router, BalancerState, CrawlDelegator, FailurePolicy, NodeState,
};
use fleetcrawl::ProcessedPage;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tempfile::TempDir;

async fn echo_node(name: &str) -> String {
    let state = NodeState::new(
        Arc::new(StaticCrawler::echo(name)),
        Arc::new(StaticCrawler::echo(&format!("{name}-js"))),
    );
    spawn_router(node_router(state)).await
}

async fn start_balancer(endpoints: Vec<String>, policy: FailurePolicy) -> String {
    let delegator = CrawlDelegator::new(&endpoints, policy).unwrap();
    spawn_router(balancer_router(BalancerState::new(Arc::new(delegator)))).await
}

async fn get(base: &str, route: &str, js: bool, urls: &[String]) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{base}/{route}"))
        .query(&[("js", js.to_string()), ("urls", urls.join(";"))])
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_balancer_routes_each_url_to_its_shard() {
    let nodes = vec![echo_node("node0").await, echo_node("node1").await];
    let balancer = start_balancer(nodes, FailurePolicy::FailFast).await;
    let urls = urls_for_shards(&[0, 1, 0, 1], 2);

    let response = get(&balancer, "crawl", false, &urls).await;
    assert_eq!(response.status(), StatusCode::OK);

    let pages: HashMap<String, String> = response.json().await.unwrap();
    assert_eq!(pages.len(), 4);
    assert!(pages[&urls[0]].contains(&format!("node0 {}", urls[0])));
    assert!(pages[&urls[1]].contains(&format!("node1 {}", urls[1])));
    assert!(pages[&urls[2]].contains("node0"));
    assert!(pages[&urls[3]].contains("node1"));
    assert!(pages.values().all(|html| !html.contains("<script")));
}

#[tokio::test]
async fn test_balancer_forwards_js_flag() {
    let nodes = vec![echo_node("node0").await];
    let balancer = start_balancer(nodes, FailurePolicy::FailFast).await;
    let urls = vec!["http://spa.example/".to_string()];

    let pages: HashMap<String, String> = get(&balancer, "crawl", true, &urls)
        .await
        .json()
        .await
        .unwrap();

    assert!(pages[&urls[0]].contains("node0-js"));
}

#[tokio::test]
async fn test_balancer_processed_route() {
    let nodes = vec![echo_node("node0").await, echo_node("node1").await];
    let balancer = start_balancer(nodes, FailurePolicy::FailFast).await;
    let urls = urls_for_shards(&[1], 2);

    let pages: HashMap<String, ProcessedPage> = get(&balancer, "crawl_processed", false, &urls)
        .await
        .json()
        .await
        .unwrap();

    let page = &pages[&urls[0]];
    assert_eq!(page.title, format!("node1 {}", urls[0]));
    assert_eq!(page.h1, vec![format!("node1 {}", urls[0])]);
}

#[tokio::test]
async fn test_failed_node_fails_batch() {
    let failing = spawn_router(node_router(NodeState::new(
        Arc::new(StaticCrawler::failing("node0")),
        Arc::new(StaticCrawler::failing("node0-js")),
    )))
    .await;
    let nodes = vec![failing, echo_node("node1").await];
    let balancer = start_balancer(nodes, FailurePolicy::FailFast).await;
    let urls = urls_for_shards(&[0, 1], 2);

    let response = get(&balancer, "crawl", false, &urls).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("shard 0"));
    assert_eq!(body["category"], "dispatch");
    // A 500 from the node may clear on a later request
    assert_eq!(body["recoverable"], true);
}

#[tokio::test]
async fn test_partial_balancer_keeps_healthy_node() {
    let nodes = vec![
        "http://127.0.0.1:9".to_string(),
        echo_node("node1").await,
    ];
    let balancer = start_balancer(nodes, FailurePolicy::Partial).await;
    let urls = urls_for_shards(&[0, 1], 2);

    let response = get(&balancer, "crawl", false, &urls).await;
    assert_eq!(response.status(), StatusCode::OK);

    let pages: HashMap<String, String> = response.json().await.unwrap();
    assert_eq!(pages.len(), 1);
    assert!(pages.contains_key(&urls[1]));
}

#[tokio::test]
async fn test_balancer_rejects_empty_batch() {
    let balancer = start_balancer(vec![echo_node("node0").await], FailurePolicy::FailFast).await;

    let response = get(&balancer, "crawl", false, &[]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// A full node stack: browser strategy over a fake session factory, caches on disk
#[tokio::test]
async fn test_node_stack_caches_rendered_pages() {
    let temp = TempDir::new().unwrap();
    let mut config = NodeConfig::default();
    config.threads = 4;
    config.cache.dir = temp.path().to_path_buf();
    config.browser.instances = 2;
    config.browser.settle_ms = 10;
    config.browser.timeout_ms = 2000;

    let factory = FakeBrowser::default();
    let renders = Arc::clone(&factory.renders);
    let stack = NodeStack::build(&config, factory).unwrap();

    assert!(temp.path().join("direct.db").exists());
    assert!(temp.path().join("browser.db").exists());

    let node = spawn_router(node_router(stack.state())).await;
    let urls = vec!["http://spa.example/a".to_string(), "http://spa.example/b".to_string()];

    for _ in 0..2 {
        let pages: HashMap<String, String> = get(&node, "crawl", true, &urls)
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[&urls[0]].contains("rendered http://spa.example/a"));
    }

    // The second request is answered from the browser cache
    assert_eq!(renders.load(Ordering::SeqCst), 2);
    assert!(stack.browser.inner().pool().sessions_created() <= 2);

    stack.shutdown().await;
}
