//! CNN Lite strategy.
//!
//! [CNN Lite](https://lite.cnn.com) is a text-only version of CNN. The
//! homepage is a flat list of `.card--lite` links and article pages carry the
//! headline and body in `.headline--lite` / `.article--lite`. There are no
//! date elements; the publish date is part of every article URL:
//!
//! ```text
//! https://lite.cnn.com/2025/05/06/politics/article-slug
//! ```

use crate::dates::NormalizedDate;
use crate::driver::PageSnapshot;
use crate::extract;
use crate::links::{self, RawAnchor};
use crate::media::extract_media;
use crate::models::{ExtractedContent, LinkCandidate, SiteDetection, Source};
use crate::strategies::SiteStrategy;
use crate::utils::canonical_link;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

static STORY_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".card--lite a[href]").expect("valid story selector"));
static HEADLINE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".headline--lite").expect("valid headline selector"));
static ARTICLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".article--lite").expect("valid article selector"));
static URL_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(\d{4})/(\d{2})/(\d{2})/").expect("URL_DATE should compile"));

#[derive(Debug, Clone, Copy, Default)]
pub struct CnnLiteStrategy;

/// Publish date encoded in a CNN article path, as `YYYY-MM-DD`.
pub fn date_from_path(url: &str) -> Option<String> {
    let caps = URL_DATE.captures(url)?;
    let date = NaiveDate::from_ymd_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)?;
    Some(NormalizedDate::Parsed(date).to_string())
}

impl SiteStrategy for CnnLiteStrategy {
    fn name(&self) -> &'static str {
        "cnn-lite"
    }

    fn link_selectors(&self) -> &[&'static str] {
        &[".card--lite a[href]"]
    }

    fn content_selectors(&self) -> &[&'static str] {
        &[".article--lite"]
    }

    #[instrument(level = "info", skip_all, fields(url = %listing.url))]
    fn discover_links(
        &self,
        listing: &PageSnapshot,
        detection: &SiteDetection,
        source: &Source,
        limit: usize,
    ) -> Vec<LinkCandidate> {
        let Ok(base) = Url::parse(&listing.url) else {
            return Vec::new();
        };
        let document = Html::parse_document(&listing.html);

        let mut seen = HashSet::new();
        let mut anchors = Vec::new();
        for element in document.select(&STORY_LINK) {
            let Some(href) = element.value().attr("href").and_then(|h| canonical_link(&base, h)) else {
                continue;
            };
            let text = element.text().collect::<Vec<_>>().join(" ");
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.chars().count() < links::MIN_LINK_TEXT_CHARS || !seen.insert(href.clone()) {
                continue;
            }
            anchors.push(RawAnchor {
                raw_date_text: date_from_path(&href),
                href,
                text,
                container_tag: "div".to_string(),
                popularity: None,
            });
        }

        info!(count = anchors.len(), "Indexed CNN article URLs");
        if anchors.is_empty() {
            return links::discover_links(listing, self.link_selectors(), detection, source.content_focus.as_deref(), limit);
        }
        links::rank(anchors, source.content_focus.as_deref(), limit)
    }

    fn extract_content(&self, page: &PageSnapshot, detection: &SiteDetection) -> ExtractedContent {
        let Ok(base) = Url::parse(&page.url) else {
            return ExtractedContent::default();
        };
        let document = Html::parse_document(&page.html);
        let Some(article) = document.select(&ARTICLE).next() else {
            debug!(url = %page.url, "No .article--lite region; using generic extraction");
            return extract::extract(page, self.content_selectors(), detection);
        };

        let cleaned = Html::parse_fragment(&extract::clean_region(article));
        let text = extract::render_text(cleaned.root_element());
        let media = extract_media(cleaned.root_element(), &base);
        let headline = document
            .select(&HEADLINE)
            .map(|h| h.text().collect::<Vec<_>>().join(" "))
            .map(|h| h.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|h| !h.is_empty());

        ExtractedContent {
            text,
            html: article.html(),
            images: media.images,
            videos: media.videos,
            raw_date_text: date_from_path(&page.url).or_else(|| extract::find_raw_date(&document, article)),
            title_hint: headline.or_else(|| extract::title_hint(&document)),
        }
    }
}
