//! Source URL extraction from provider content.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Maximum number of sources surfaced per search.
pub const MAX_SOURCES: usize = 5;

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]+\]\(([^)]+)\)").unwrap())
}

fn bare_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s\)]+").unwrap())
}

/// Scan content for markdown-style links and bare URLs.
///
/// Each candidate is validated as a well-formed URL, duplicates are dropped
/// while preserving first-seen order, and the result is capped at
/// [`MAX_SOURCES`].
pub fn extract_sources(content: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    for capture in markdown_link_re().captures_iter(content) {
        if let Some(link) = capture.get(1) {
            candidates.push(link.as_str().to_string());
        }
    }

    for m in bare_url_re().find_iter(content) {
        candidates.push(m.as_str().to_string());
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| Url::parse(candidate).is_ok())
        .filter(|candidate| seen.insert(candidate.clone()))
        .take(MAX_SOURCES)
        .collect()
}
