//! Utility functions for URL handling, text cleanup, logging, and file system checks.
//!
//! This module provides helper functions used throughout the crawler:
//! - URL resolution and canonicalization for links and media
//! - Whitespace collapsing for extracted text
//! - String truncation for log fields
//! - Output directory validation

use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Resolve `href` against `base` into an absolute `http(s)` URL.
///
/// Protocol-relative (`//cdn.example.com/x`) and relative paths are resolved;
/// anything that does not end up as `http` or `https` yields `None`.
pub fn resolve_http_url(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = base.join(href).ok()?;
    matches!(resolved.scheme(), "http" | "https").then_some(resolved)
}

/// Canonical form of a link used as its identity: absolute, no fragment.
pub fn canonical_link(base: &Url, href: &str) -> Option<String> {
    let mut url = resolve_http_url(base, href)?;
    url.set_fragment(None);
    Some(url.to_string())
}

/// Host of `url` without a leading `www.`, lowercased.
///
/// For example: `"https://www.Example.com/article"` -> `"example.com"`
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Collapse runs of spaces/tabs inside lines, trim every line, and squeeze
/// consecutive blank lines down to one.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(&line);
    }
    out
}

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to roughly `max` bytes (on a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log("a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Ensure the directory that will hold `output_path` exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %output_path.display()))]
pub async fn ensure_writable_dir(output_path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = dir.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "뉴스".repeat(10);
        let result = truncate_for_log(&s, 4);
        assert!(result.starts_with("뉴"));
    }

    #[test]
    fn test_resolve_http_url() {
        let base = Url::parse("https://example.com/news/index.html").unwrap();
        assert_eq!(
            resolve_http_url(&base, "/post/1").unwrap().as_str(),
            "https://example.com/post/1"
        );
        assert_eq!(
            resolve_http_url(&base, "//cdn.example.com/a.png").unwrap().as_str(),
            "https://cdn.example.com/a.png"
        );
        assert_eq!(
            resolve_http_url(&base, "story.html").unwrap().as_str(),
            "https://example.com/news/story.html"
        );
        assert!(resolve_http_url(&base, "mailto:me@example.com").is_none());
        assert!(resolve_http_url(&base, "data:image/png;base64,AAAA").is_none());
        assert!(resolve_http_url(&base, "   ").is_none());
    }

    #[test]
    fn test_canonical_link_strips_fragment() {
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(
            canonical_link(&base, "/post/1#comments").as_deref(),
            Some("https://example.com/post/1")
        );
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://www.Example.com/a").as_deref(), Some("example.com"));
        assert_eq!(domain_of("https://lite.cnn.com/2025/05/06/x").as_deref(), Some("lite.cnn.com"));
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn test_collapse_whitespace() {
        let text = "  Title   here \n\n\n\n First\tparagraph  \n   \nSecond ";
        assert_eq!(collapse_whitespace(text), "Title here\n\nFirst paragraph\n\nSecond");
    }

    #[test]
    fn test_word_count() {
        assert_eq!(word_count("  two   words "), 2);
        assert_eq!(word_count(""), 0);
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("nested/out/results.json");
        ensure_writable_dir(&target).await.unwrap();
        assert!(tmp.path().join("nested/out").is_dir());
    }
}
