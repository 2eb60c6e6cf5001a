//! HTML post-processing for crawled pages
//!
//! The crawl core passes page content through untouched. The node controller
//! uses [`HtmlProcessor`] to strip non-content elements from raw markup and to
//! extract a [`ProcessedPage`] (title, visible text, headings).

use scraper::{Html, Selector};

use crate::models::ProcessedPage;
use crate::utils::normalize_whitespace;

/// Elements that never carry readable content
pub const TAGS_TO_REMOVE: &str =
    "iframe, embed, script, noscript, nobr, style, link, img, source, wbr, area, base, param";

const HEADINGS: &str = "h1, h2, h3, h4, h5, h6";

/// Stateless HTML transform used by the node controller
#[derive(Debug, Clone)]
pub struct HtmlProcessor {
    removed: Selector,
    title: Selector,
    body: Selector,
    headings: Selector,
}

impl Default for HtmlProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlProcessor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            removed: Selector::parse(TAGS_TO_REMOVE).expect("Invalid removal selector"),
            title: Selector::parse("title").expect("Invalid title selector"),
            body: Selector::parse("body").expect("Invalid body selector"),
            headings: Selector::parse(HEADINGS).expect("Invalid heading selector"),
        }
    }

    /// Remove non-content elements and re-serialize the document
    pub fn clean(&self, html: &str) -> String {
        let mut document = Html::parse_document(html);
        self.strip(&mut document);
        document.html()
    }

    /// Extract title, visible body text and headings
    pub fn process(&self, html: &str) -> ProcessedPage {
        let mut document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .map(|t| normalize_whitespace(&t.text().collect::<String>()))
            .unwrap_or_default();

        self.strip(&mut document);

        let mut page = ProcessedPage {
            title,
            ..Default::default()
        };

        let Some(body) = document.select(&self.body).next() else {
            return page;
        };

        page.content = normalize_whitespace(&body.text().collect::<Vec<_>>().join(" "));

        for heading in body.select(&self.headings) {
            let level = heading.value().name()[1..].parse::<u8>().unwrap_or(0);
            let text = normalize_whitespace(&heading.text().collect::<String>());
            if !text.is_empty() {
                page.push_heading(level, text);
            }
        }

        page
    }

    fn strip(&self, document: &mut Html) {
        let ids: Vec<_> = document.select(&self.removed).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}
