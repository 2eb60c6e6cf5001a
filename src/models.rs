// Core data structures for fleetcrawl

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::utils::split_url_list;

/// Crawl result: URL to raw page content
///
/// URLs whose fetch timed out or failed are simply missing.
pub type PageMap = HashMap<String, String>;

/// Crawl result in processed form: URL to extracted document
pub type ProcessedMap = HashMap<String, ProcessedPage>;

/// Highest heading level extracted from a page
pub const MAX_HEADING_LEVEL: u8 = 6;

/// Structured form of a crawled page
///
/// Serialized as `{title, content, h1..h6}`, the format produced by
/// `/crawl_processed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedPage {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub h1: Vec<String>,
    #[serde(default)]
    pub h2: Vec<String>,
    #[serde(default)]
    pub h3: Vec<String>,
    #[serde(default)]
    pub h4: Vec<String>,
    #[serde(default)]
    pub h5: Vec<String>,
    #[serde(default)]
    pub h6: Vec<String>,
}

impl ProcessedPage {
    /// Headings of the given level (1..=6), in document order
    pub fn headings(&self, level: u8) -> &[String] {
        match level {
            1 => &self.h1,
            2 => &self.h2,
            3 => &self.h3,
            4 => &self.h4,
            5 => &self.h5,
            6 => &self.h6,
            _ => &[],
        }
    }

    /// Append a heading of the given level; other levels are ignored
    pub fn push_heading(&mut self, level: u8, text: String) {
        let slot = match level {
            1 => &mut self.h1,
            2 => &mut self.h2,
            3 => &mut self.h3,
            4 => &mut self.h4,
            5 => &mut self.h5,
            6 => &mut self.h6,
            _ => return,
        };
        slot.push(text);
    }

    /// Headings grouped by level, skipping empty levels
    pub fn headings_by_level(&self) -> Vec<(u8, &[String])> {
        (1..=MAX_HEADING_LEVEL)
            .map(|level| (level, self.headings(level)))
            .filter(|(_, h)| !h.is_empty())
            .collect()
    }
}

/// Query string of `/crawl` and `/crawl_processed`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlQuery {
    /// Semicolon-joined URL list
    #[serde(default)]
    pub urls: String,

    /// Render pages in the headless browser
    #[serde(default)]
    pub js: bool,
}

impl CrawlQuery {
    /// Parsed, de-duplicated URL list
    pub fn url_list(&self) -> Vec<String> {
        split_url_list(&self.urls)
    }
}
