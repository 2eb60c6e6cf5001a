//! Tests for RemoteCrawlerClient against mocked crawler nodes

use fleetcrawl::coordinator::RemoteCrawlerClient;
use fleetcrawl::utils::error::ClientError;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urls(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_crawl_returns_page_map() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crawl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "http://a.example/": "<p>a</p>",
            "http://b.example/": "<p>b</p>",
        })))
        .mount(&node)
        .await;

    let client = RemoteCrawlerClient::new(&node.uri()).unwrap();
    let pages = client
        .crawl(false, &urls(&["http://a.example/", "http://b.example/"]))
        .await
        .unwrap();

    assert_eq!(pages.len(), 2);
    assert_eq!(pages["http://a.example/"], "<p>a</p>");
}

/// URLs with their own query strings survive the round trip through `urls`
#[tokio::test]
async fn test_query_parameters_are_encoded() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crawl"))
        .and(query_param("js", "true"))
        .and(query_param(
            "urls",
            "http://a.example/search?q=rust&page=2;https://b.example/#top",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&node)
        .await;

    let client = RemoteCrawlerClient::new(&node.uri()).unwrap();
    let pages = client
        .crawl(
            true,
            &urls(&[
                "http://a.example/search?q=rust&page=2",
                "https://b.example/#top",
            ]),
        )
        .await
        .unwrap();

    assert!(pages.is_empty());
}

#[tokio::test]
async fn test_base_path_is_kept() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fleet/node-1/crawl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&node)
        .await;

    let client = RemoteCrawlerClient::new(&format!("{}/fleet/node-1/", node.uri())).unwrap();
    client.crawl(false, &urls(&["http://a.example/"])).await.unwrap();
}

#[tokio::test]
async fn test_non_success_status_is_http_error() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("draining"))
        .mount(&node)
        .await;

    let client = RemoteCrawlerClient::new(&node.uri()).unwrap();
    let err = client
        .crawl(false, &urls(&["http://a.example/"]))
        .await
        .unwrap_err();

    match err {
        ClientError::HttpError { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "draining");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "a", "map"])))
        .mount(&node)
        .await;

    let client = RemoteCrawlerClient::new(&node.uri()).unwrap();
    let err = client
        .crawl(false, &urls(&["http://a.example/"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::ParseError(_)));
}

#[tokio::test]
async fn test_unreachable_node_is_network_error() {
    let client = RemoteCrawlerClient::new("http://127.0.0.1:9").unwrap();
    let err = client
        .crawl(false, &urls(&["http://a.example/"]))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NetworkError(_)));
}

#[tokio::test]
async fn test_crawl_processed_route() {
    let node = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/crawl_processed"))
        .and(query_param("js", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "http://a.example/": {
                "title": "A",
                "content": "alpha",
                "h1": ["Alpha"],
                "h2": ["One", "Two"]
            }
        })))
        .expect(1)
        .mount(&node)
        .await;

    let client = RemoteCrawlerClient::new(&node.uri()).unwrap();
    let pages = client
        .crawl_processed(false, &urls(&["http://a.example/"]))
        .await
        .unwrap();

    let page = &pages["http://a.example/"];
    assert_eq!(page.title, "A");
    assert_eq!(page.h2, vec!["One", "Two"]);
    assert!(page.h6.is_empty());
}

#[test]
fn test_rejects_non_http_base() {
    assert!(matches!(
        RemoteCrawlerClient::new("ftp://10.0.0.1/"),
        Err(ClientError::InvalidEndpoint { .. })
    ));
    assert!(matches!(
        RemoteCrawlerClient::new("not a url"),
        Err(ClientError::InvalidEndpoint { .. })
    ));
}
