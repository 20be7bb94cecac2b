//! Link discovery and ranking on listing pages.
//!
//! Discovery walks a selector plan (site-specific, then detected, then
//! universal selectors) and collects anchors in first-seen order,
//! deduplicated by absolute URL. Each anchor is paired with a publish-date
//! string when one can be found near it:
//!
//! 1. inside its own item container (climbing ancestors while they still
//!    look like a single item)
//! 2. in the sibling elements of its nearest block container
//! 3. positionally: the Nth anchor takes the Nth date-looking string of the
//!    page, assuming document order follows recency
//!
//! Ranking is an additive quality score:
//!
//! | Signal | Points |
//! |--------|--------|
//! | associated publish date | +5 |
//! | 2..=20 words of anchor text | +3 |
//! | content-like URL path | +2 |
//! | nearest block is `article`/`li`/`div` | +1 |
//!
//! A content-focus phrase adds a keyword bonus once the pool is large
//! enough to be worth re-ranking.

use crate::dates::{find_date_like, first_date_like};
use crate::driver::PageSnapshot;
use crate::models::{LinkCandidate, SiteDetection};
use crate::utils::{canonical_link, word_count};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const DATE_POINTS: i32 = 5;
pub const TITLE_POINTS: i32 = 3;
pub const PATH_POINTS: i32 = 2;
pub const CONTAINER_POINTS: i32 = 1;

pub const FOCUS_TITLE_POINTS: i32 = 5;
pub const FOCUS_URL_POINTS: i32 = 2;
pub const VOCABULARY_POINTS: i32 = 1;

/// Focus re-ranking only kicks in for pools larger than this.
pub const FOCUS_RERANK_THRESHOLD: usize = 5;
/// Anchors considered by the indiscriminate fallback pass.
pub const FALLBACK_ANCHOR_LIMIT: usize = 50;
pub const DEFAULT_CANDIDATE_LIMIT: usize = 20;
pub const MIN_LINK_TEXT_CHARS: usize = 3;

const MAX_ITEM_DEPTH: usize = 5;
const MAX_ITEM_ANCHORS: usize = 3;
const SIBLING_REACH: usize = 2;

pub const CONTENT_PATH_PATTERNS: &[&str] = &["/article/", "/post/", "/story/", "/blog/", "/news/", "/item?id="];

const SCORED_CONTAINERS: &[&str] = &["article", "li", "div"];

const BLOCK_TAGS: &[&str] = &[
    "article", "li", "div", "section", "main", "td", "tr", "p", "aside", "nav", "header", "footer", "ul",
    "ol", "table", "dd", "figure", "body",
];

/// Selectors applied to every page after the site and detected ones.
pub const UNIVERSAL_LINK_SELECTORS: &[&str] = &[
    "article a[href]",
    ".post a[href]",
    ".entry-title a[href]",
    ".headline a[href]",
    ".title a[href]",
    "h2 a[href]",
    "h3 a[href]",
    "[class*=title] a[href]",
    "li a[href]",
];

const DOMAIN_VOCABULARY: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "llm",
    "research",
    "technology",
    "launch",
    "release",
    "announces",
];

const NON_CONTENT_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "sms:", "data:"];

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid body selector"));
static DATE_ELEMENT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "time, [datetime], .date, .time, .published, .post-date, .article-date, .entry-date, .timestamp, .age, \
         [class~=date], [class*=-date], [class*=date-], [class*=_date]",
    )
    .expect("valid date selector")
});

/// An anchor found during discovery, before scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAnchor {
    pub href: String,
    pub text: String,
    pub raw_date_text: Option<String>,
    pub container_tag: String,
    pub popularity: Option<String>,
}

/// Ordered, duplicate-free selector plan: site-specific, detected, universal.
pub fn selector_plan(site: &[&str], detection: &SiteDetection) -> Vec<String> {
    let mut plan: Vec<String> = Vec::new();
    let detected = detection.article_selectors.iter().map(String::as_str);
    for selector in site.iter().copied().chain(detected).chain(UNIVERSAL_LINK_SELECTORS.iter().copied()) {
        if !plan.iter().any(|s| s == selector) {
            plan.push(selector.to_string());
        }
    }
    plan
}

/// Discover and rank links on a listing page.
#[instrument(level = "info", skip_all, fields(url = %snapshot.url))]
pub fn discover_links(
    snapshot: &PageSnapshot,
    site_selectors: &[&str],
    detection: &SiteDetection,
    content_focus: Option<&str>,
    limit: usize,
) -> Vec<LinkCandidate> {
    let Ok(base) = Url::parse(&snapshot.url) else {
        warn!("Listing URL is not absolute; no links discovered");
        return Vec::new();
    };
    let document = Html::parse_document(&snapshot.html);
    let plan = selector_plan(site_selectors, detection);

    let mut anchors = collect_anchors(&document, &base, &plan);
    if anchors.is_empty() {
        info!("No links matched the selector plan; scanning all anchors");
        anchors = collect_fallback_anchors(&document, &base);
    }
    let candidates = rank(anchors, content_focus, limit);
    info!(count = candidates.len(), "Ranked link candidates");
    candidates
}

/// Anchors matched by `plan`, with dates associated.
///
/// Selectors may match anchors directly or containers holding them. Anchors
/// inside `<nav>` or `<footer>` are ignored, and each canonical href is
/// kept once, at its first position in plan order.
///
/// # Arguments
///
/// * `document` - The parsed listing page
/// * `base` - URL relative hrefs are resolved against
/// * `plan` - Selectors in priority order, see [`selector_plan`]
///
/// # Returns
///
/// Raw anchors in discovery order, not yet scored.
pub fn collect_anchors(document: &Html, base: &Url, plan: &[String]) -> Vec<RawAnchor> {
    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for raw in plan {
        let Ok(selector) = Selector::parse(raw) else {
            warn!(selector = %raw, "Skipping invalid selector");
            continue;
        };
        for element in document.select(&selector) {
            let anchors: Vec<ElementRef<'_>> = if element.value().name() == "a" {
                vec![element]
            } else {
                element.select(&ANCHOR).collect()
            };
            for anchor in anchors {
                if in_page_chrome(anchor) {
                    continue;
                }
                if let Some(raw_anchor) = accept_anchor(anchor, base, &mut seen) {
                    found.push(raw_anchor);
                }
            }
        }
    }

    pair_positional_dates(document, &mut found);
    debug!(count = found.len(), "Collected anchors from selector plan");
    found
}

/// The first [`FALLBACK_ANCHOR_LIMIT`] anchors of the page, filtered.
pub fn collect_fallback_anchors(document: &Html, base: &Url) -> Vec<RawAnchor> {
    let mut seen = HashSet::new();
    let mut found: Vec<RawAnchor> = document
        .select(&ANCHOR)
        .take(FALLBACK_ANCHOR_LIMIT)
        .filter_map(|anchor| accept_anchor(anchor, base, &mut seen))
        .collect();
    pair_positional_dates(document, &mut found);
    found
}

fn accept_anchor(anchor: ElementRef<'_>, base: &Url, seen: &mut HashSet<String>) -> Option<RawAnchor> {
    let href = anchor.value().attr("href")?.trim();
    if is_non_content_href(href) {
        return None;
    }
    let text = anchor.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.chars().count() < MIN_LINK_TEXT_CHARS {
        return None;
    }
    let href = canonical_link(base, href)?;
    if href == base.as_str() || !seen.insert(href.clone()) {
        return None;
    }
    Some(RawAnchor {
        href,
        text,
        raw_date_text: date_near(anchor),
        container_tag: nearest_block(anchor).map(|b| b.value().name().to_string()).unwrap_or_default(),
        popularity: None,
    })
}

/// `javascript:`, `mailto:`, `tel:` and bare fragments never lead to articles.
pub fn is_non_content_href(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    lower.is_empty() || lower.starts_with('#') || NON_CONTENT_SCHEMES.iter().any(|s| lower.starts_with(s))
}

fn in_page_chrome(anchor: ElementRef<'_>) -> bool {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "nav" | "footer"))
}

fn nearest_block(anchor: ElementRef<'_>) -> Option<ElementRef<'_>> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| BLOCK_TAGS.contains(&a.value().name()))
}

/// Date text near `anchor`: own item container first, then its siblings.
fn date_near(anchor: ElementRef<'_>) -> Option<String> {
    for ancestor in anchor.ancestors().filter_map(ElementRef::wrap).take(MAX_ITEM_DEPTH) {
        if matches!(ancestor.value().name(), "body" | "html") {
            break;
        }
        if ancestor.select(&ANCHOR).count() > MAX_ITEM_ANCHORS {
            break;
        }
        if let Some(date) = date_in(ancestor) {
            return Some(date);
        }
    }

    let container = nearest_block(anchor)?;
    let previous = container.prev_siblings().filter_map(ElementRef::wrap).take(SIBLING_REACH);
    let next = container.next_siblings().filter_map(ElementRef::wrap).take(SIBLING_REACH);
    previous.chain(next).find_map(date_in_element_or_below)
}

fn date_in(scope: ElementRef<'_>) -> Option<String> {
    if let Some(date) = scope.select(&DATE_ELEMENT).find_map(date_from_element) {
        return Some(date);
    }
    let text = scope.text().collect::<Vec<_>>().join(" ");
    first_date_like(&text).map(str::to_string)
}

fn date_in_element_or_below(el: ElementRef<'_>) -> Option<String> {
    if DATE_ELEMENT.matches(&el) {
        if let Some(date) = date_from_element(el) {
            return Some(date);
        }
    }
    date_in(el)
}

fn date_from_element(el: ElementRef<'_>) -> Option<String> {
    let attr = el
        .value()
        .attr("datetime")
        .or_else(|| el.value().attr("title"))
        .map(str::trim)
        .filter(|v| !v.is_empty() && first_date_like(v).is_some());
    if let Some(value) = attr {
        return Some(value.to_string());
    }
    let text = el.text().collect::<Vec<_>>().join(" ");
    first_date_like(&text).map(str::to_string)
}

/// Give undated anchors the date-looking string at their own position.
fn pair_positional_dates(document: &Html, anchors: &mut [RawAnchor]) {
    if anchors.iter().all(|a| a.raw_date_text.is_some()) {
        return;
    }
    let Some(body) = document.select(&BODY).next() else {
        return;
    };
    let text = body.text().collect::<Vec<_>>().join(" ");
    let dates: Vec<&str> = find_date_like(&text).collect();
    for (anchor, date) in anchors.iter_mut().zip(dates) {
        if anchor.raw_date_text.is_none() {
            anchor.raw_date_text = Some(date.to_string());
        }
    }
}

/// Base quality score of one anchor.
pub fn quality_score(anchor: &RawAnchor) -> i32 {
    let mut score = 0;
    if anchor.raw_date_text.is_some() {
        score += DATE_POINTS;
    }
    if (2..=20).contains(&word_count(&anchor.text)) {
        score += TITLE_POINTS;
    }
    let href = anchor.href.to_lowercase();
    if CONTENT_PATH_PATTERNS.iter().any(|p| href.contains(p)) {
        score += PATH_POINTS;
    }
    if SCORED_CONTAINERS.contains(&anchor.container_tag.as_str()) {
        score += CONTAINER_POINTS;
    }
    score
}

/// Keyword bonus for a content-focus phrase.
pub fn focus_bonus(candidate: &LinkCandidate, keywords: &[String]) -> i32 {
    let title = candidate.text.to_lowercase();
    let words: HashSet<&str> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let href = candidate.href.to_lowercase();
    let mentions = |term: &str| {
        if term.contains(' ') {
            title.contains(term)
        } else {
            words.contains(term)
        }
    };

    let mut bonus = 0;
    for keyword in keywords {
        if mentions(keyword) {
            bonus += FOCUS_TITLE_POINTS;
        }
        if href.contains(keyword.as_str()) {
            bonus += FOCUS_URL_POINTS;
        }
    }
    bonus += DOMAIN_VOCABULARY.iter().filter(|term| mentions(term)).count() as i32 * VOCABULARY_POINTS;
    bonus
}

/// Lowercased, deduplicated keywords of a focus phrase.
pub fn focus_keywords(focus: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in focus.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.chars().count() >= 2 && !keywords.contains(&word) {
            keywords.push(word);
        }
    }
    keywords
}

/// Score, order and truncate discovered anchors.
///
/// Order: score descending, dated before undated, then discovery order.
///
/// # Arguments
///
/// * `anchors` - Deduplicated anchors in discovery order
/// * `content_focus` - Optional topic phrase; its keyword bonus only applies
///   to pools larger than [`FOCUS_RERANK_THRESHOLD`]
/// * `limit` - Maximum number of candidates returned
///
/// # Returns
///
/// The top `limit` candidates, best first.
pub fn rank(anchors: Vec<RawAnchor>, content_focus: Option<&str>, limit: usize) -> Vec<LinkCandidate> {
    let mut candidates: Vec<(usize, LinkCandidate)> = anchors
        .into_iter()
        .enumerate()
        .map(|(order, anchor)| {
            let quality_score = quality_score(&anchor);
            (
                order,
                LinkCandidate {
                    href: anchor.href,
                    text: anchor.text,
                    raw_date_text: anchor.raw_date_text,
                    quality_score,
                    container_tag: anchor.container_tag,
                    popularity: anchor.popularity,
                },
            )
        })
        .collect();

    let keywords = content_focus.map(focus_keywords).unwrap_or_default();
    if !keywords.is_empty() && candidates.len() > FOCUS_RERANK_THRESHOLD {
        for (_, candidate) in candidates.iter_mut() {
            candidate.quality_score += focus_bonus(candidate, &keywords);
        }
        debug!(?keywords, "Applied content-focus bonus");
    }

    sort_candidates(&mut candidates);
    candidates.into_iter().take(limit).map(|(_, c)| c).collect()
}

/// Stable total order over `(order, candidate)` pairs.
pub fn sort_candidates(candidates: &mut [(usize, LinkCandidate)]) {
    candidates.sort_by_key(|(order, c)| (Reverse(c.quality_score), Reverse(c.raw_date_text.is_some()), *order));
}
