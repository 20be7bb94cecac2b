//! Main-content extraction from an article page.
//!
//! The content region is chosen by a cascade, first non-empty hit wins:
//!
//! 1. CMS-specific selectors when the CMS is known
//! 2. site-specific, detected and catalog content selectors
//! 3. semantic tags (`article`, `main`, `[role=main]`)
//! 4. a text-density scorer over `div`/`section`/`article`
//! 5. `<body>`
//!
//! The region is then cleaned of boilerplate (scripts, navigation, ads,
//! comment and share widgets, hidden elements, form controls) before text
//! and media are read from it. The publish date is searched independently
//! and returned as found; normalization happens later.

use crate::dates::first_date_like;
use crate::detect::CONTENT_SELECTOR_CATALOG;
use crate::driver::PageSnapshot;
use crate::error::ExtractionError;
use crate::media::extract_media;
use crate::models::{Cms, ExtractedContent, SiteDetection};
use crate::utils::{collapse_whitespace, truncate_for_log};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

/// Content containers per CMS, most specific first.
const CMS_CONTENT_SELECTORS: &[(Cms, &[&str])] = &[
    (Cms::Wordpress, &[".entry-content", ".post-content", "article .entry", ".single-post .content"]),
    (Cms::Ghost, &[".gh-content", ".post-content", ".kg-card-markdown", ".post-full-content"]),
    (Cms::Medium, &["article section", "article"]),
    (Cms::Reddit, &["[slot=text-body]", "[data-test-id=post-content]", ".usertext-body", "shreddit-post"]),
    (Cms::Drupal, &[".field--name-body", ".field-name-body", ".node__content"]),
];

const SEMANTIC_SELECTORS: &[&str] = &["article", "main", "[role=main]"];

/// Publish-date meta tags, in priority order.
const DATE_META_SELECTORS: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[name="article:published_time"]"#,
    r#"meta[itemprop="datePublished"]"#,
    r#"meta[property="og:published_time"]"#,
    r#"meta[name="pubdate"]"#,
    r#"meta[name="publishdate"]"#,
    r#"meta[name="publish-date"]"#,
    r#"meta[name="date"]"#,
    r#"meta[name="DC.date.issued"]"#,
    r#"meta[name="sailthru.date"]"#,
    r#"meta[property="article:modified_time"]"#,
];

/// Publish-date elements, in priority order.
const DATE_DOM_SELECTORS: &[&str] = &[
    "time[datetime]",
    "[itemprop=datePublished]",
    ".published",
    ".post-date",
    ".entry-date",
    ".article-date",
    ".publish-date",
    ".date",
    "time",
];

const CONTENT_TOKENS: &[&str] = &["content", "article", "post", "entry", "story", "body", "text"];
const CHROME_TOKENS: &[&str] = &["sidebar", "nav", "footer", "header", "menu", "comment", "widget", "related"];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article", "blockquote", "pre",
    "tr", "ul", "ol", "figure", "figcaption", "header", "table", "dd", "dt",
];

/// Density candidates with less own text than this are ignored.
const MIN_DENSITY_TEXT: usize = 140;
/// Selector and CMS matches shorter than this are bylines or teasers, not bodies.
const MIN_REGION_TEXT: usize = 40;

static JUNK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "script, style, noscript, template, iframe[src*=ads], nav, footer, aside, form, input, button, select, \
         textarea, [hidden], [aria-hidden=true], [style*=\"display:none\"], [style*=\"display: none\"], \
         [class~=ad], [class~=ads], [class*=advert], [id*=advert], [class*=sponsor], [class*=promo], [class*=comment], \
         [id*=comment], [class*=social], [class*=share], [class*=login], [class*=signup], [class*=newsletter], \
         [class*=subscribe]",
    )
    .expect("valid junk selector")
});
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid body selector"));
static DENSITY_CANDIDATES: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div, section, article").expect("valid density selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("valid p selector"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("valid a selector"));
static JSON_LD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid JSON-LD selector")
});
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid h1 selector"));
static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid og:title selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid title selector"));

/// Which cascade stage produced the content region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSource {
    Cms,
    Selector,
    Semantic,
    Density,
    Body,
}

/// Extract the main content; failures degrade to an empty result.
#[instrument(level = "info", skip_all, fields(url = %snapshot.url))]
pub fn extract(snapshot: &PageSnapshot, site_selectors: &[&str], detection: &SiteDetection) -> ExtractedContent {
    match try_extract(snapshot, site_selectors, detection) {
        Ok(content) => {
            debug!(
                chars = content.text.len(),
                images = content.images.len(),
                videos = content.videos.len(),
                date = ?content.raw_date_text,
                "Extracted content"
            );
            content
        }
        Err(e) => {
            warn!(error = %e, "Content extraction failed; using empty content");
            ExtractedContent::default()
        }
    }
}

pub fn try_extract(
    snapshot: &PageSnapshot,
    site_selectors: &[&str],
    detection: &SiteDetection,
) -> Result<ExtractedContent, ExtractionError> {
    if snapshot.html.trim().is_empty() {
        return Err(ExtractionError::EmptySnapshot);
    }
    let base = Url::parse(&snapshot.url).map_err(|_| ExtractionError::BaseUrl(snapshot.url.clone()))?;
    let document = Html::parse_document(&snapshot.html);

    let (region, source) = select_region(&document, site_selectors, detection)?;
    debug!(?source, "Selected content region");

    let cleaned_html = clean_region(region);
    let cleaned = Html::parse_fragment(&cleaned_html);
    let text = render_text(cleaned.root_element());
    let media = extract_media(cleaned.root_element(), &base);

    Ok(ExtractedContent {
        text,
        html: cleaned_html,
        images: media.images,
        videos: media.videos,
        raw_date_text: find_raw_date(&document, region),
        title_hint: title_hint(&document),
    })
}

/// Run the region cascade. Always yields a region; `<body>` (or the root
/// element of a body-less document) closes it.
pub fn select_region<'a>(
    document: &'a Html,
    site_selectors: &[&str],
    detection: &SiteDetection,
) -> Result<(ElementRef<'a>, RegionSource), ExtractionError> {
    if let Some(cms_list) = cms_selectors(detection.cms) {
        if let Some(region) = longest_match(document, cms_list, MIN_REGION_TEXT)? {
            return Ok((region, RegionSource::Cms));
        }
    }

    let mut plan: Vec<&str> = site_selectors.to_vec();
    for selector in detection.content_selectors.iter().map(String::as_str).chain(CONTENT_SELECTOR_CATALOG.iter().copied()) {
        if !plan.contains(&selector) {
            plan.push(selector);
        }
    }
    if let Some(region) = longest_match(document, &plan, MIN_REGION_TEXT)? {
        return Ok((region, RegionSource::Selector));
    }

    if let Some(region) = longest_match(document, SEMANTIC_SELECTORS, 1)? {
        return Ok((region, RegionSource::Semantic));
    }

    if let Some(region) = densest_block(document) {
        return Ok((region, RegionSource::Density));
    }

    let body = document.select(&BODY).next().unwrap_or_else(|| document.root_element());
    Ok((body, RegionSource::Body))
}

fn cms_selectors(cms: Cms) -> Option<&'static [&'static str]> {
    CMS_CONTENT_SELECTORS
        .iter()
        .find(|(known, _)| *known == cms)
        .map(|(_, selectors)| *selectors)
}

/// For the first selector whose longest match carries at least `min_chars`
/// of text, that match.
fn longest_match<'a>(
    document: &'a Html,
    selectors: &[&str],
    min_chars: usize,
) -> Result<Option<ElementRef<'a>>, ExtractionError> {
    for raw in selectors {
        let selector = Selector::parse(raw).map_err(|_| ExtractionError::Selector(raw.to_string()))?;
        let best = document
            .select(&selector)
            .map(|el| (text_chars(el), el))
            .max_by_key(|(chars, _)| *chars);
        if let Some((chars, region)) = best {
            if chars >= min_chars.max(1) {
                return Ok(Some(region));
            }
            debug!(selector = %raw, chars, "Region too short; trying next selector");
        }
    }
    Ok(None)
}

fn text_chars(el: ElementRef<'_>) -> usize {
    el.text().map(|t| t.trim().chars().count()).sum()
}

/// Highest-scoring `div`/`section`/`article` by text density.
pub fn densest_block(document: &Html) -> Option<ElementRef<'_>> {
    let mut best: Option<(i64, ElementRef<'_>)> = None;
    for candidate in document.select(&DENSITY_CANDIDATES) {
        let Some(score) = density_score(candidate) else {
            continue;
        };
        if best.as_ref().is_none_or(|(top, _)| score > *top) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, el)| el)
}

/// Text length plus paragraph bonus, minus link weight. Deeper elements win
/// ties with the wrappers that contain them.
fn density_score(el: ElementRef<'_>) -> Option<i64> {
    let text_len = text_chars(el) as i64;
    if (text_len as usize) < MIN_DENSITY_TEXT {
        return None;
    }
    let link_len = el
        .select(&ANCHOR)
        .flat_map(|a| a.text())
        .map(|t| t.trim().chars().count())
        .sum::<usize>() as i64;
    let link_density = link_len as f64 / text_len as f64;
    let paragraphs = el.select(&PARAGRAPH).count() as i64;
    let anchors = el.select(&ANCHOR).count() as i64;
    let depth = el.ancestors().count() as i64;

    let mut score = text_len.min(8000) + paragraphs * 200 - anchors * 50 + depth * 10;
    if link_density > 0.5 {
        score /= 2;
    }

    let names = [el.value().attr("class").unwrap_or_default(), el.value().id().unwrap_or_default()]
        .join(" ")
        .to_lowercase();
    if CHROME_TOKENS.iter().any(|t| names.contains(t)) {
        score /= 10;
    } else if CONTENT_TOKENS.iter().any(|t| names.contains(t)) {
        score += 300;
    }
    Some(score)
}

/// Serialized region with boilerplate subtrees cut out.
pub fn clean_region(region: ElementRef<'_>) -> String {
    let mut html = region.html();
    for junk in region.select(&JUNK) {
        let fragment = junk.html();
        if let Some(at) = html.find(&fragment) {
            html.replace_range(at..at + fragment.len(), "");
        }
    }
    html
}

/// Visible text, one paragraph per block element.
pub fn render_text(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(root, &mut out);
    collapse_whitespace(&out)
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    let block = BLOCK_TAGS.contains(&el.value().name());
    if block {
        out.push('\n');
    }
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            push_text(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        }
    }
    if block {
        out.push('\n');
    }
}

/// Publish-date text: meta tags, JSON-LD, date elements (region first, then
/// the whole document), then free text of the region.
pub fn find_raw_date(document: &Html, region: ElementRef<'_>) -> Option<String> {
    for raw in DATE_META_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let found = document
            .select(&selector)
            .filter_map(|m| m.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty());
        if let Some(content) = found {
            return Some(content.to_string());
        }
    }

    if let Some(date) = json_ld_date(document) {
        return Some(date);
    }

    for raw in DATE_DOM_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let hit = region
            .select(&selector)
            .chain(document.select(&selector))
            .find_map(date_from_element);
        if hit.is_some() {
            return hit;
        }
    }

    let text = region.text().collect::<Vec<_>>().join(" ");
    first_date_like(&text).map(str::to_string)
}

fn date_from_element(el: ElementRef<'_>) -> Option<String> {
    if let Some(value) = ["datetime", "content"]
        .iter()
        .filter_map(|attr| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
    {
        return Some(value.to_string());
    }
    let text = el.text().collect::<Vec<_>>().join(" ");
    first_date_like(&text).map(str::to_string)
}

/// `datePublished` from the first JSON-LD block that carries one.
pub fn json_ld_date(document: &Html) -> Option<String> {
    document.select(&JSON_LD).find_map(|script| {
        let raw = script.text().collect::<String>();
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(value) => date_published(&value),
            Err(e) => {
                debug!(error = %e, block = %truncate_for_log(&raw, 120), "Skipping malformed JSON-LD");
                None
            }
        }
    })
}

fn date_published(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(date)) = map.get("datePublished") {
                let date = date.trim();
                if !date.is_empty() {
                    return Some(date.to_string());
                }
            }
            map.get("@graph").and_then(date_published)
        }
        Value::Array(items) => items.iter().find_map(date_published),
        _ => None,
    }
}

/// Page headline: first `<h1>`, then `og:title`, then `<title>`.
pub fn title_hint(document: &Html) -> Option<String> {
    let normalize = |s: String| {
        let s = s.split_whitespace().collect::<Vec<_>>().join(" ");
        (!s.is_empty()).then_some(s)
    };
    document
        .select(&H1)
        .find_map(|h| normalize(h.text().collect()))
        .or_else(|| {
            document
                .select(&OG_TITLE)
                .find_map(|m| m.value().attr("content").and_then(|c| normalize(c.to_string())))
        })
        .or_else(|| document.select(&TITLE).find_map(|t| normalize(t.text().collect())))
}
