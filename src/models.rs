//! Data models shared across the crawl pipeline.
//!
//! This module defines the core data structures:
//! - [`Source`]: One configured site to crawl
//! - [`SiteDetection`]: Platform/CMS/structure fingerprint of a page
//! - [`LinkCandidate`]: A ranked anchor discovered on a listing page
//! - [`ExtractedContent`]: Main text and media of one fetched article
//! - [`Story`]: One accepted article with normalized metadata
//! - [`CrawlResult`]: Aggregate outcome for one source
//!
//! The serialized field names follow the JSON consumed by the downstream
//! categorization step (`date_posted`, `fullContent`, `imageUrls`, ...).

use crate::dates::relevance::DEFAULT_TIMEFRAME_HOURS;
use serde::{Deserialize, Serialize};

pub use crate::dates::NormalizedDate;

pub const DEFAULT_MAX_ITEMS: usize = 1;

/// One configured site to crawl.
///
/// Immutable for the duration of a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// The listing page to discover articles on.
    pub url: String,
    /// Maximum number of stories to keep.
    pub max_items: usize,
    /// Optional topic phrase used to boost matching links.
    pub content_focus: Option<String>,
    /// Relevance window, in hours before now.
    pub timeframe_hours: u32,
}

impl Source {
    /// Create a source with the default limits.
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL of the listing page
    ///
    /// # Returns
    ///
    /// A source keeping [`DEFAULT_MAX_ITEMS`] stories from the last
    /// [`DEFAULT_TIMEFRAME_HOURS`] hours, without a content focus.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_items: DEFAULT_MAX_ITEMS,
            content_focus: None,
            timeframe_hours: DEFAULT_TIMEFRAME_HOURS,
        }
    }

    /// Maximum number of stories kept for this source.
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Topic phrase whose keywords boost matching links.
    pub fn content_focus(mut self, focus: Option<String>) -> Self {
        self.content_focus = focus;
        self
    }

    /// Relevance window, in hours before now.
    pub fn timeframe_hours(mut self, hours: u32) -> Self {
        self.timeframe_hours = hours;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Blog,
    News,
    Social,
    Forum,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cms {
    Wordpress,
    Medium,
    Reddit,
    Ghost,
    Drupal,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Structure {
    Semantic,
    ContentBased,
    #[default]
    Unknown,
}

/// Inferred fingerprint of a page.
///
/// Both selector lists only contain selectors that matched at least one
/// element of the page they were computed from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDetection {
    pub platform: Platform,
    pub cms: Cms,
    pub structure: Structure,
    pub article_selectors: Vec<String>,
    pub content_selectors: Vec<String>,
}

impl SiteDetection {
    /// The all-unknown detection used when classification fails.
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// An anchor discovered on a listing page, not yet fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCandidate {
    /// Absolute URL without fragment; unique within one discovery pass.
    pub href: String,
    pub text: String,
    pub raw_date_text: Option<String>,
    pub quality_score: i32,
    /// Nearest block container of the anchor (`article`, `li`, `div`, ...).
    pub container_tag: String,
    /// Popularity signal, when the listing exposes one.
    pub popularity: Option<String>,
}

/// Main content of one fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    pub html: String,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    /// Publish date as found on the page, not yet normalized.
    pub raw_date_text: Option<String>,
    pub title_hint: Option<String>,
}

impl ExtractedContent {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One accepted article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub headline: String,
    /// Absolute URL; unique within a [`CrawlResult`].
    pub link: String,
    #[serde(rename = "date_posted")]
    pub date_posted: Option<NormalizedDate>,
    #[serde(rename = "fullContent")]
    pub full_content: String,
    #[serde(rename = "imageUrls")]
    pub image_urls: Vec<String>,
    #[serde(rename = "videoUrls")]
    pub video_urls: Vec<String>,
    pub popularity: Option<String>,
    /// Host the story was found on.
    pub source: String,
    pub tags: Vec<String>,
}

/// A candidate that was fetched but produced no story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedLink {
    pub href: String,
    pub reason: String,
}

/// Aggregate outcome for one configured source.
///
/// Zero stories with a populated `error` is a valid outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub source: String,
    pub stories: Vec<Story>,
    pub error: Option<String>,
    pub site_info: SiteDetection,
    #[serde(default)]
    pub skipped: Vec<SkippedLink>,
}

impl CrawlResult {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into(), ..Self::default() }
    }

    /// A result for a source that failed before any story was produced.
    pub fn failed(source: impl Into<String>, error: impl ToString) -> Self {
        Self { error: Some(error.to_string()), ..Self::new(source) }
    }
}
