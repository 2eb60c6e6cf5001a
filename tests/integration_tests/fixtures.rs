//! Test fixtures for integration tests
//!
//! Provides sample HTML data and helper functions for testing

use std::collections::HashMap;

/// Sample article with noise elements the node strips
pub const SAMPLE_ARTICLE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Fleet Weekly</title>
    <style>.ad { display: none; }</style>
    <script src="/analytics.js"></script>
</head>
<body>
    <h1>Shipping update</h1>
    <p>The new crawler release is live on every node.</p>
    <script>window.tracker = 1;</script>
    <h2>Changes</h2>
    <p>Browser sessions are now pooled.</p>
    <iframe src="https://ads.example.com/banner"></iframe>
    <h2>Known issues</h2>
</body>
</html>
"#;

/// Page rendered client-side; only the browser strategy sees its text
pub const SAMPLE_SPA_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>App Shell</title></head>
<body><div id="root">Rendered by script</div></body>
</html>
"#;

pub const ARTICLE_URL: &str = "http://news.example/fleet-weekly";
pub const SPA_URL: &str = "http://app.example/";

/// Decode a `/crawl` response body
pub async fn json_map(response: reqwest::Response) -> HashMap<String, String> {
    response.json().await.unwrap()
}
