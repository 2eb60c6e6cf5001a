//! Client for a remote crawler node
//!
//! Issues exactly one `GET` per call; retries and deadlines are left to the
//! caller (the delegator fails the batch fast instead).

use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::models::{PageMap, ProcessedMap};
use crate::utils::error::ClientError;
use crate::utils::{join_url_list, truncate_text};

/// Longest error body kept in [`ClientError::HttpError`]
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Route returning raw (cleaned) page content
pub const CRAWL_ROUTE: &str = "crawl";

/// Route returning processed page documents
pub const CRAWL_PROCESSED_ROUTE: &str = "crawl_processed";

/// Client bound to one crawler node base address
#[derive(Debug, Clone)]
pub struct RemoteCrawlerClient {
    base: Url,
    http_client: Client,
}

impl RemoteCrawlerClient {
    /// Create a client with its own HTTP connection pool
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| ClientError::InitError(e.to_string()))?;
        Self::with_client(base_url, http_client)
    }

    /// Create a client sharing an existing HTTP connection pool
    pub fn with_client(base_url: &str, http_client: Client) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidEndpoint {
            address: base_url.to_string(),
            reason,
        };

        let base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(invalid("expected an http(s) base address".to_string()));
        }

        Ok(Self { base, http_client })
    }

    /// Base address of the node
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Build `{base}/{route}?js=<bool>&urls=<a;b;c>` with the query percent-encoded
    pub fn request_url(&self, route: &str, render_js: bool, urls: &[String]) -> Url {
        let mut url = self.base.clone();
        let path = format!("{}/{route}", self.base.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("js", if render_js { "true" } else { "false" })
            .append_pair("urls", &join_url_list(urls));
        url
    }

    /// Fetch raw pages for `urls` from the node
    pub async fn crawl(&self, render_js: bool, urls: &[String]) -> Result<PageMap, ClientError> {
        self.get_json(self.request_url(CRAWL_ROUTE, render_js, urls))
            .await
    }

    /// Fetch processed pages for `urls` from the node
    pub async fn crawl_processed(
        &self,
        render_js: bool,
        urls: &[String],
    ) -> Result<ProcessedMap, ClientError> {
        self.get_json(self.request_url(CRAWL_PROCESSED_ROUTE, render_js, urls))
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::HttpError {
                status: status.as_u16(),
                message: truncate_text(
                    &response.text().await.unwrap_or_default(),
                    MAX_ERROR_BODY_CHARS,
                ),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::NetworkError(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| ClientError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_encodes_batch() {
        let client = RemoteCrawlerClient::new("http://10.0.0.1:8080").unwrap();
        let urls = vec![
            "http://a.com/x?y=1".to_string(),
            "https://b.com/".to_string(),
        ];

        let url = client.request_url(CRAWL_ROUTE, true, &urls);

        assert_eq!(url.path(), "/crawl");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("js".to_string(), "true".to_string()),
                ("urls".to_string(), "http://a.com/x?y=1;https://b.com/".to_string()),
            ]
        );
        assert!(!url.as_str().contains(';'));
    }

    #[test]
    fn test_request_url_keeps_base_path() {
        let client = RemoteCrawlerClient::new("http://node:8080/fleet/").unwrap();
        let url = client.request_url(CRAWL_PROCESSED_ROUTE, false, &["u".to_string()]);
        assert_eq!(url.path(), "/fleet/crawl_processed");
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            RemoteCrawlerClient::new("not an address"),
            Err(ClientError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            RemoteCrawlerClient::new("mailto:ops@example.com"),
            Err(ClientError::InvalidEndpoint { .. })
        ));
    }
}
