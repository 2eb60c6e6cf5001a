//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Separator used for URL batches on the wire
pub const URL_SEPARATOR: char = ';';

/// Split a semicolon-joined URL list, dropping empty segments and duplicates
///
/// Segments are kept verbatim, surrounding whitespace included, so response
/// keys match the URLs the caller sent. First-seen order is preserved.
pub fn split_url_list(joined: &str) -> Vec<String> {
    dedup_urls(joined.split(URL_SEPARATOR).filter(|s| !s.is_empty()))
}

/// Join URLs into the wire representation
pub fn join_url_list<S: AsRef<str>>(urls: &[S]) -> String {
    urls.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&URL_SEPARATOR.to_string())
}

/// Remove duplicate URLs while keeping first-seen order
pub fn dedup_urls<I, S>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter_map(|u| {
            let u = u.as_ref();
            seen.insert(u.to_string()).then(|| u.to_string())
        })
        .collect()
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Truncate text to a maximum number of characters, for log fields
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
