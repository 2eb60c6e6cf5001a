//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use fleetcrawl::coordinator::shard_for;
use fleetcrawl::crawler::pool::{BrowserSession, SessionFactory};
use fleetcrawl::crawler::Crawler;
use fleetcrawl::models::PageMap;
use fleetcrawl::utils::error::CrawlError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Pick distinct URLs whose shards among `shards` endpoints follow `pattern`
pub fn urls_for_shards(pattern: &[usize], shards: usize) -> Vec<String> {
    let mut picked: Vec<String> = Vec::with_capacity(pattern.len());
    let mut candidates = (0..).map(|i| format!("http://site-{i}.example/page"));

    for &wanted in pattern {
        let url = candidates
            .by_ref()
            .find(|url| shard_for(url, shards) == wanted && !picked.contains(url))
            .unwrap();
        picked.push(url);
    }

    picked
}

/// Page markup padded past the cache threshold
pub fn page_html(title: &str) -> String {
    format!(
        "<html><head><title>{title}</title><script>track()</script></head>\
         <body><h1>{title}</h1><p>{}</p></body></html>",
        "lorem ipsum ".repeat(30)
    )
}

/// Crawler serving fixed pages; unknown URLs are absent
pub struct StaticCrawler {
    name: String,
    pages: HashMap<String, String>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StaticCrawler {
    pub fn new(name: &str, pages: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            pages: pages
                .iter()
                .map(|(u, c)| (u.to_string(), c.to_string()))
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A crawler whose every fetch task fails
    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, &[])
        }
    }

    /// Serve `page_html(url)` for every URL
    pub fn echo(name: &str) -> Self {
        Self::new(name, &[])
    }
}

#[async_trait]
impl Crawler for StaticCrawler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn crawl_one(&self, url: &str) -> Result<Option<String>, CrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CrawlError::Task {
                url: url.to_string(),
                reason: "worker panicked".to_string(),
            });
        }
        if self.pages.is_empty() {
            return Ok(Some(page_html(&format!("{} {url}", self.name))));
        }
        Ok(self.pages.get(url).cloned())
    }
}

/// Browser session factory rendering a fixed template, counting renders
#[derive(Clone, Default)]
pub struct FakeBrowser {
    pub renders: Arc<AtomicUsize>,
}

pub struct FakeBrowserSession {
    renders: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionFactory for FakeBrowser {
    type Session = FakeBrowserSession;

    async fn create(&self) -> anyhow::Result<FakeBrowserSession> {
        Ok(FakeBrowserSession {
            renders: Arc::clone(&self.renders),
        })
    }
}

#[async_trait]
impl BrowserSession for FakeBrowserSession {
    async fn render(&mut self, url: &str, settle: Duration) -> anyhow::Result<String> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(settle).await;
        Ok(page_html(&format!("rendered {url}")))
    }
}

/// Collect a `PageMap` into sorted (url, content) pairs
pub fn sorted(pages: &PageMap) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = pages
        .iter()
        .map(|(u, c)| (u.clone(), c.clone()))
        .collect();
    pairs.sort();
    pairs
}
