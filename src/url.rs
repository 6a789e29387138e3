//! Candidate media-link detection.

use std::sync::LazyLock;

use regex::Regex;

static WATCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://(www\.)?youtube\.com/(watch\?|shorts/)\S+").expect("valid regex")
});

static SHORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://youtu\.be/\S+").expect("valid regex"));

/// Returns true if the text looks like a link the extractor can handle.
///
/// This is a cheap pre-filter so plain chat messages get a gentle hint
/// instead of a round-trip through the extraction service.
#[must_use]
pub fn is_media_link(text: &str) -> bool {
    let t = text.trim();
    WATCH_RE.is_match(t) || SHORT_RE.is_match(t)
}

/// Extracts the first candidate link from a message, if any.
#[must_use]
pub fn first_media_link(text: &str) -> Option<&str> {
    WATCH_RE
        .find(text)
        .or_else(|| SHORT_RE.find(text))
        .map(|m| m.as_str())
}
