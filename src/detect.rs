//! Site classification: platform, CMS and layout fingerprinting.
//!
//! Classification reads the page snapshot only:
//!
//! - **CMS**: ordered substring signatures over the serialized DOM, first
//!   match wins. Order encodes specificity.
//! - **Platform**: keyword buckets over title and meta description/keywords.
//! - **Structure**: `<article>` elements win over `post`/`news` class names.
//! - **Selectors**: a fixed catalog probed against the document; only
//!   selectors matching at least one element are kept.
//!
//! Classification is best-effort. Any failure yields
//! [`SiteDetection::unknown`].

use crate::driver::PageSnapshot;
use crate::error::ExtractionError;
use crate::models::{Cms, Platform, SiteDetection, Structure};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// CMS signatures, checked in order against the lowercased markup.
///
/// Only generator tags and platform-owned assets: a plain link to another
/// site must not mark the page as that site's CMS.
const CMS_SIGNATURES: &[(Cms, &str)] = &[
    (Cms::Ghost, r#"<meta name="generator" content="ghost"#),
    (Cms::Wordpress, r#"<meta name="generator" content="wordpress"#),
    (Cms::Drupal, r#"<meta name="generator" content="drupal"#),
    (Cms::Ghost, "ghost-portal"),
    (Cms::Wordpress, "wp-content"),
    (Cms::Wordpress, "wp-includes"),
    (Cms::Drupal, "drupal-settings-json"),
    (Cms::Drupal, "/sites/default/files"),
    (Cms::Medium, "cdn-client.medium.com"),
    (Cms::Reddit, "redditstatic.com"),
    (Cms::Reddit, "shreddit-"),
];

/// Platform keyword buckets, checked in order.
const PLATFORM_BUCKETS: &[(Platform, &[&str])] = &[
    (
        Platform::News,
        &["news", "뉴스", "breaking", "headlines", "press", "times", "daily", "herald", "journal", "신문"],
    ),
    (Platform::Blog, &["blog", "블로그", "diary", "notes", "substack"]),
    (
        Platform::Forum,
        &["forum", "community", "discussion", "board", "thread", "커뮤니티", "게시판"],
    ),
    (Platform::Social, &["social", "twitter", "facebook", "instagram", "mastodon"]),
];

/// Containers that hold links to individual articles.
pub const ARTICLE_SELECTOR_CATALOG: &[&str] = &[
    "article",
    ".post",
    ".article",
    ".entry",
    ".story",
    ".news-item",
    ".post-item",
    ".article-item",
    ".card",
    ".entry-title",
    ".headline",
    "[class*=post-title]",
    "[class*=article-title]",
    "h2",
    "h3",
];

/// Containers that hold the main body of an article page.
pub const CONTENT_SELECTOR_CATALOG: &[&str] = &[
    "[itemprop=articleBody]",
    ".entry-content",
    ".post-content",
    ".article-content",
    ".article-body",
    ".story-body",
    ".post-body",
    "#article-body",
    "article",
    "main",
    "[role=main]",
    "#content",
    ".content",
];

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid title selector"));
static META_TEXT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"meta[name=description], meta[name=keywords], meta[property="og:site_name"], meta[property="og:type"]"#,
    )
    .expect("valid meta selector")
});
static ARTICLE_TAG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article").expect("valid article selector"));
static CONTENT_CLASS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[class*=post], [class*=news]").expect("valid class selector")
});

/// Classify a page; failures degrade to [`SiteDetection::unknown`].
#[instrument(level = "info", skip_all, fields(url = %snapshot.url))]
pub fn classify(snapshot: &PageSnapshot) -> SiteDetection {
    match try_classify(snapshot) {
        Ok(detection) => {
            debug!(
                platform = ?detection.platform,
                cms = ?detection.cms,
                structure = ?detection.structure,
                article_selectors = detection.article_selectors.len(),
                content_selectors = detection.content_selectors.len(),
                "Classified site"
            );
            detection
        }
        Err(e) => {
            warn!(error = %e, "Site classification failed; using unknown detection");
            SiteDetection::unknown()
        }
    }
}

pub fn try_classify(snapshot: &PageSnapshot) -> Result<SiteDetection, ExtractionError> {
    if snapshot.html.trim().is_empty() {
        return Err(ExtractionError::EmptySnapshot);
    }
    let document = Html::parse_document(&snapshot.html);
    let markup = snapshot.html.to_lowercase();

    Ok(SiteDetection {
        platform: detect_platform(&document),
        cms: detect_cms(&markup),
        structure: detect_structure(&document),
        article_selectors: probe_selectors(&document, ARTICLE_SELECTOR_CATALOG)?,
        content_selectors: probe_selectors(&document, CONTENT_SELECTOR_CATALOG)?,
    })
}

fn detect_cms(markup: &str) -> Cms {
    CMS_SIGNATURES
        .iter()
        .find(|(_, needle)| markup.contains(needle))
        .map(|(cms, _)| *cms)
        .unwrap_or(Cms::Unknown)
}

fn detect_platform(document: &Html) -> Platform {
    let mut signals: Vec<String> = document
        .select(&TITLE)
        .map(|t| t.text().collect::<String>())
        .collect();
    signals.extend(
        document
            .select(&META_TEXT)
            .filter_map(|m| m.value().attr("content"))
            .map(str::to_string),
    );
    let haystack = signals.join(" ").to_lowercase();
    let words: HashSet<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    // Hangul keywords take particles and compounds, so they match as substrings.
    let mentions = |keyword: &str| {
        if keyword.is_ascii() {
            words.contains(keyword)
        } else {
            haystack.contains(keyword)
        }
    };

    PLATFORM_BUCKETS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| mentions(k)))
        .map(|(platform, _)| *platform)
        .unwrap_or(Platform::Unknown)
}

fn detect_structure(document: &Html) -> Structure {
    if document.select(&ARTICLE_TAG).next().is_some() {
        Structure::Semantic
    } else if document.select(&CONTENT_CLASS).next().is_some() {
        Structure::ContentBased
    } else {
        Structure::Unknown
    }
}

/// Keep the catalog entries that match at least one element, in catalog order.
pub fn probe_selectors(document: &Html, catalog: &[&str]) -> Result<Vec<String>, ExtractionError> {
    let mut matched = Vec::new();
    for raw in catalog {
        let selector = Selector::parse(raw).map_err(|_| ExtractionError::Selector(raw.to_string()))?;
        if document.select(&selector).next().is_some() && !matched.iter().any(|m| m == raw) {
            matched.push(raw.to_string());
        }
    }
    Ok(matched)
}

/// Per-run memo of [`SiteDetection`] keyed by page URL.
///
/// Writes are idempotent: racing tasks may both classify the same URL and
/// the later insert overwrites an equivalent value.
#[derive(Debug, Default)]
pub struct SiteDetectionCache {
    entries: DashMap<String, SiteDetection>,
}

impl SiteDetectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<SiteDetection> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    /// Cached detection for `snapshot.url`, classifying on a miss.
    pub fn get_or_classify(&self, snapshot: &PageSnapshot) -> SiteDetection {
        if let Some(hit) = self.get(&snapshot.url) {
            debug!(url = %snapshot.url, "Site detection cache hit");
            return hit;
        }
        let detection = classify(snapshot);
        self.entries.insert(snapshot.url.clone(), detection.clone());
        detection
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(html: &str) -> PageSnapshot {
        PageSnapshot { url: "https://example.com/".to_string(), html: html.to_string() }
    }

    #[test]
    fn test_ghost_generator_beats_blog_keyword() {
        let detection = classify(&snapshot(
            r#"<html><head><title>My Blog</title>
                <meta name="generator" content="Ghost 5.2">
                <link rel="stylesheet" href="/wp-content/theme.css"></head>
                <body><article><h2><a href="/p/1">Post</a></h2></article></body></html>"#,
        ));
        assert_eq!(detection.cms, Cms::Ghost);
        assert_eq!(detection.platform, Platform::Blog);
        assert_eq!(detection.structure, Structure::Semantic);
    }

    #[test]
    fn test_wordpress_by_asset_path() {
        let detection = classify(&snapshot(
            r#"<html><head><title>City Herald - Local News</title>
                <script src="/wp-includes/js/jquery.js"></script></head>
                <body><div class="post-list"><div class="post"><a href="/a">A story</a></div></div></body></html>"#,
        ));
        assert_eq!(detection.cms, Cms::Wordpress);
        assert_eq!(detection.platform, Platform::News);
        assert_eq!(detection.structure, Structure::ContentBased);
        assert_eq!(detection.article_selectors, vec![".post".to_string()]);
    }

    #[test]
    fn test_selectors_are_verified_against_page() {
        let detection = classify(&snapshot(
            r#"<html><body><main><div class="entry-content"><p>Body</p></div></main></body></html>"#,
        ));
        assert_eq!(
            detection.content_selectors,
            vec![".entry-content".to_string(), "main".to_string()]
        );
        assert!(detection.article_selectors.is_empty());
        assert_eq!(detection.structure, Structure::Unknown);
        assert_eq!(detection.platform, Platform::Unknown);
        assert_eq!(detection.cms, Cms::Unknown);
    }

    #[test]
    fn test_forum_from_meta_description() {
        let detection = classify(&snapshot(
            r#"<html><head><title>Rustaceans</title>
                <meta name="description" content="A community discussion board"></head><body></body></html>"#,
        ));
        assert_eq!(detection.platform, Platform::Forum);
    }

    #[test]
    fn test_platform_keywords_match_whole_words() {
        let detection = classify(&snapshot(
            r#"<html><head><title>Keyboard dashboard</title>
                <meta name="description" content="Sometimes we review gear"></head><body></body></html>"#,
        ));
        assert_eq!(detection.platform, Platform::Unknown);

        let korean = classify(&snapshot(r#"<html><head><title>자유게시판 - 모임</title></head><body></body></html>"#));
        assert_eq!(korean.platform, Platform::Forum);
    }

    #[test]
    fn test_outbound_platform_links_do_not_set_cms() {
        let detection = classify(&snapshot(
            r#"<html><head><title>City Herald</title></head><body><article>
                <p>See <a href="https://medium.com/@someone/post">this essay</a>,
                <a href="https://www.reddit.com/r/rust/">this thread</a> and
                <a href="https://someone.ghost.io/p/">this blog</a>.</p>
            </article></body></html>"#,
        ));
        assert_eq!(detection.cms, Cms::Unknown);
        assert_eq!(detection.platform, Platform::News);
    }

    #[test]
    fn test_empty_snapshot_yields_unknown() {
        assert_eq!(classify(&snapshot("   ")), SiteDetection::unknown());
        assert!(try_classify(&snapshot("")).is_err());
    }

    #[test]
    fn test_cache_memoizes_by_url() {
        let cache = SiteDetectionCache::new();
        let snap = snapshot("<html><body><article>x</article></body></html>");
        let first = cache.get_or_classify(&snap);
        assert_eq!(cache.len(), 1);

        // a different body under the same URL is served from the cache
        let changed = snapshot("<html><body><p>x</p></body></html>");
        assert_eq!(cache.get_or_classify(&changed), first);
        assert_eq!(cache.len(), 1);
    }
}
