//! Persistent page cache with time-to-live expiry
//!
//! [`PageStore`] keeps one SQLite file per namespace (`<dir>/<namespace>.db`).
//! Entries expire `ttl` after insertion; reads never refresh them. Expired rows
//! read as absent and are purged when the store is opened.
//!
//! [`CachingCrawler`] puts a store in front of any [`Crawler`]. Both the
//! single-URL and the batch path are read-through: fresh entries are served
//! from the store and only misses reach the wrapped crawler. Pages shorter
//! than the configured minimum length are returned but never stored.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use crate::crawler::Crawler;
use crate::metrics;
use crate::models::PageMap;
use crate::utils::dedup_urls;
use crate::utils::error::{CacheError, CrawlError};

/// Default minimum content length, in characters, for a page to be cached
pub const DEFAULT_MIN_CONTENT_LEN: usize = 200;

/// Placeholders per batched lookup, below SQLite's variable limit
const LOOKUP_CHUNK: usize = 500;

/// SQLite-backed URL to content store with TTL expiry
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct PageStore {
    conn: Mutex<Connection>,
    namespace: String,
    ttl: Duration,
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStore")
            .field("namespace", &self.namespace)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn validate_namespace(namespace: &str) -> Result<(), CacheError> {
    let valid = !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CacheError::InvalidNamespace(namespace.to_string()))
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl PageStore {
    /// Open (or create) the store for `namespace` under `dir`
    pub fn open(dir: impl AsRef<Path>, namespace: &str, ttl: Duration) -> Result<Self, CacheError> {
        validate_namespace(namespace)?;
        let dir = dir.as_ref();

        std::fs::create_dir_all(dir).map_err(|source| CacheError::Directory {
            path: dir.display().to_string(),
            source,
        })?;

        let path = dir.join(format!("{namespace}.db"));
        let conn = Connection::open(&path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::with_connection(conn, namespace, ttl)?;
        let purged = store.purge_expired()?;

        info!(
            path = %path.display(),
            namespace = %namespace,
            ttl_secs = ttl.as_secs(),
            purged = purged,
            "Page cache opened"
        );
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory(namespace: &str, ttl: Duration) -> Result<Self, CacheError> {
        validate_namespace(namespace)?;
        Self::with_connection(Connection::open_in_memory()?, namespace, ttl)
    }

    fn with_connection(conn: Connection, namespace: &str, ttl: Duration) -> Result<Self, CacheError> {
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS pages (
                    url TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    inserted_at INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_pages_inserted_at
                    ON pages(inserted_at);
                "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.to_string(),
            ttl,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Oldest insertion time that is still fresh
    fn fresh_after(&self) -> i64 {
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        now_millis().saturating_sub(ttl_ms)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up one URL; expired entries read as absent
    pub fn get(&self, url: &str) -> Result<Option<String>, CacheError> {
        let conn = self.conn();
        let content = conn
            .query_row(
                "SELECT content FROM pages WHERE url = ?1 AND inserted_at > ?2",
                params![url, self.fresh_after()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    /// Look up a batch of URLs, returning only fresh hits
    pub fn get_many(&self, urls: &[String]) -> Result<PageMap, CacheError> {
        let mut hits = PageMap::new();
        if urls.is_empty() {
            return Ok(hits);
        }

        let fresh_after = self.fresh_after();
        let conn = self.conn();

        for chunk in urls.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let query = format!(
                "SELECT url, content FROM pages WHERE inserted_at > ? AND url IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&query)?;

            let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(chunk.len() + 1);
            values.push(&fresh_after);
            values.extend(chunk.iter().map(|u| u as &dyn rusqlite::ToSql));

            let rows = stmt.query_map(values.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (url, content) = row?;
                hits.insert(url, content);
            }
        }

        Ok(hits)
    }

    /// Store one page, replacing any previous entry and restarting its TTL
    pub fn put(&self, url: &str, content: &str) -> Result<(), CacheError> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO pages (url, content, inserted_at) VALUES (?1, ?2, ?3)",
            params![url, content, now_millis()],
        )?;
        Ok(())
    }

    /// Store several pages in one transaction
    pub fn put_many<'a, I>(&self, pages: I) -> Result<usize, CacheError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let now = now_millis();
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO pages (url, content, inserted_at) VALUES (?1, ?2, ?3)",
            )?;
            for (url, content) in pages {
                stmt.execute(params![url, content, now])?;
                written += 1;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Delete expired entries, returning how many were removed
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let conn = self.conn();
        let removed = conn.execute(
            "DELETE FROM pages WHERE inserted_at <= ?1",
            params![self.fresh_after()],
        )?;
        Ok(removed)
    }

    /// Number of stored rows, expired ones included until purged
    pub fn len(&self) -> Result<usize, CacheError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

/// Crawler decorator that serves fresh pages from a [`PageStore`]
pub struct CachingCrawler<C: Crawler> {
    inner: C,
    store: PageStore,
    min_content_len: usize,
}

impl<C: Crawler> CachingCrawler<C> {
    pub fn new(inner: C, store: PageStore, min_content_len: usize) -> Self {
        Self {
            inner,
            store,
            min_content_len,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn store(&self) -> &PageStore {
        &self.store
    }

    fn cacheable(&self, content: &str) -> bool {
        content.chars().count() >= self.min_content_len
    }
}

#[async_trait]
impl<C: Crawler> Crawler for CachingCrawler<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn crawl_one(&self, url: &str) -> Result<Option<String>, CrawlError> {
        let namespace = self.store.namespace();

        if let Some(content) = self.store.get(url)? {
            metrics::record_cache_lookup(namespace, 1, 0);
            return Ok(Some(content));
        }
        metrics::record_cache_lookup(namespace, 0, 1);

        let page = self.inner.crawl_one(url).await?;
        if let Some(content) = &page {
            if self.cacheable(content) {
                self.store.put(url, content)?;
                metrics::record_cache_writes(namespace, 1);
            }
        }

        Ok(page)
    }

    async fn crawl_many(&self, urls: &[String]) -> Result<PageMap, CrawlError> {
        let namespace = self.store.namespace();
        let urls = dedup_urls(urls);

        let mut pages = self.store.get_many(&urls)?;
        let misses: Vec<String> = urls
            .into_iter()
            .filter(|url| !pages.contains_key(url))
            .collect();

        metrics::record_cache_lookup(namespace, pages.len(), misses.len());
        debug!(
            namespace = %namespace,
            hits = pages.len(),
            misses = misses.len(),
            "Cache lookup"
        );

        if misses.is_empty() {
            return Ok(pages);
        }

        let fetched = self.inner.crawl_many(&misses).await?;

        let written = self.store.put_many(
            fetched
                .iter()
                .filter(|(_, content)| self.cacheable(content))
                .map(|(url, content)| (url.as_str(), content.as_str())),
        )?;
        metrics::record_cache_writes(namespace, written);

        pages.extend(fetched);
        Ok(pages)
    }
}
