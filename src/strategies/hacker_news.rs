//! Hacker News front page strategy.
//!
//! Stories are `tr.athing` rows. The row right after each one (the
//! "subtext" row) holds the points and an `span.age` whose `title` carries
//! the submission timestamp (`"2024-01-01T12:00:00 1704110400"`). Target
//! pages are arbitrary sites and go through generic extraction.
//!
//! HN keeps stories on the front page for a while, so the backup window is
//! widened to 30 days.

use crate::dates::RelevancePolicy;
use crate::driver::PageSnapshot;
use crate::links::{self, RawAnchor};
use crate::models::{LinkCandidate, SiteDetection, Source};
use crate::strategies::SiteStrategy;
use crate::utils::canonical_link;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{info, instrument};
use url::Url;

pub const BACKUP_DAYS: u32 = 30;

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr.athing").expect("valid row selector"));
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".titleline > a").expect("valid title selector"));
static AGE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.age").expect("valid age selector"));
static SCORE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.score").expect("valid score selector"));

#[derive(Debug, Clone, Copy, Default)]
pub struct HackerNewsStrategy;

fn squash(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Timestamp of an `span.age`: the ISO part of its `title`, else its text.
fn age_text(age: ElementRef<'_>) -> Option<String> {
    age.value()
        .attr("title")
        .and_then(|t| t.split_whitespace().next())
        .map(str::to_string)
        .or_else(|| Some(squash(age)).filter(|t| !t.is_empty()))
}

impl SiteStrategy for HackerNewsStrategy {
    fn name(&self) -> &'static str {
        "hacker-news"
    }

    fn link_selectors(&self) -> &[&'static str] {
        &["tr.athing .titleline > a"]
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
        for row in document.select(&ROW) {
            let Some(link) = row.select(&TITLE_LINK).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href").and_then(|h| canonical_link(&base, h)) else {
                continue;
            };
            let text = squash(link);
            if text.chars().count() < links::MIN_LINK_TEXT_CHARS || !seen.insert(href.clone()) {
                continue;
            }
            let subtext = row.next_siblings().filter_map(ElementRef::wrap).next();
            let raw_date_text = subtext.and_then(|s| s.select(&AGE).next()).and_then(age_text);
            let popularity = subtext
                .and_then(|s| s.select(&SCORE).next())
                .map(squash)
                .filter(|p| !p.is_empty());

            anchors.push(RawAnchor { href, text, raw_date_text, container_tag: "tr".to_string(), popularity });
        }

        info!(count = anchors.len(), "Indexed Hacker News stories");
        if anchors.is_empty() {
            return links::discover_links(listing, self.link_selectors(), detection, source.content_focus.as_deref(), limit);
        }
        links::rank(anchors, source.content_focus.as_deref(), limit)
    }

    fn relevance_policy(&self, source: &Source) -> RelevancePolicy {
        RelevancePolicy::with_timeframe_hours(source.timeframe_hours).backup_days(Some(BACKUP_DAYS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRONT_PAGE: &str = r#"<html><body><table>
        <tr class="athing submission" id="1">
          <td class="title"><span class="rank">1.</span></td>
          <td class="title"><span class="titleline"><a href="https://blog.example.com/rust-2024">Rust 2024 is out</a>
            <span class="sitebit comhead"> (<a href="from?site=example.com"><span class="sitestr">example.com</span></a>)</span></span></td>
        </tr>
        <tr><td colspan="2"></td><td class="subtext"><span class="subline">
          <span class="score" id="score_1">312 points</span> by <a class="hnuser">alice</a>
          <span class="age" title="2024-01-01T12:00:00 1704110400"><a href="item?id=1">2 hours ago</a></span></span></td></tr>
        <tr class="spacer"></tr>
        <tr class="athing submission" id="2">
          <td class="title"><span class="rank">2.</span></td>
          <td class="title"><span class="titleline"><a href="item?id=2">Ask HN: How do you test crawlers?</a></span></td>
        </tr>
        <tr><td colspan="2"></td><td class="subtext"><span class="subline">
          <span class="age"><a href="item?id=2">5 hours ago</a></span></span></td></tr>
    </table></body></html>"#;

    #[test]
    fn test_reads_rows_with_dates_and_points() {
        let listing = PageSnapshot { url: "https://news.ycombinator.com/".to_string(), html: FRONT_PAGE.to_string() };
        let links = HackerNewsStrategy.discover_links(
            &listing,
            &SiteDetection::unknown(),
            &Source::new("https://news.ycombinator.com/"),
            20,
        );
        assert_eq!(links.len(), 2);

        let ask = links.iter().find(|l| l.href == "https://news.ycombinator.com/item?id=2").unwrap();
        assert_eq!(ask.raw_date_text.as_deref(), Some("5 hours ago"));
        assert_eq!(ask.popularity, None);

        let rust = links.iter().find(|l| l.href == "https://blog.example.com/rust-2024").unwrap();
        assert_eq!(rust.raw_date_text.as_deref(), Some("2024-01-01T12:00:00"));
        assert_eq!(rust.popularity.as_deref(), Some("312 points"));
        assert_eq!(rust.text, "Rust 2024 is out");
    }

    #[test]
    fn test_backup_window_is_widened() {
        let policy = HackerNewsStrategy.relevance_policy(&Source::new("https://news.ycombinator.com/"));
        assert_eq!(policy.backup_days, Some(BACKUP_DAYS));
        assert_eq!(policy.timeframe_hours, 48);
    }
}
