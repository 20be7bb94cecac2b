//! Site strategies and the shared crawl pipeline.
//!
//! Every source is crawled by one [`SiteStrategy`]. The generic strategy
//! composes classification, link scoring and content extraction; named
//! strategies replace discovery and/or extraction with hand-tuned logic for
//! one layout. All of them run through [`run`], so every strategy emits the
//! same [`Story`]/[`CrawlResult`] shapes and every story passes the
//! [`DateRelevanceFilter`]. A strategy can only widen or narrow the window
//! through [`SiteStrategy::relevance_policy`].
//!
//! # Strategies
//!
//! | Domain | Strategy | Notes |
//! |--------|----------|-------|
//! | (any) | [`generic::GenericStrategy`] | Detection-driven |
//! | `lite.cnn.com` | [`cnn_lite::CnnLiteStrategy`] | Date from URL path |
//! | `news.ycombinator.com` | [`hacker_news::HackerNewsStrategy`] | Points as popularity, 30-day backup window |

pub mod cnn_lite;
pub mod generic;
pub mod hacker_news;

use crate::classifier::{Classifier, ClassificationRequest};
use crate::dates::{DateNormalizer, DateRelevanceFilter, RelevancePolicy};
use crate::detect::SiteDetectionCache;
use crate::driver::{PageDriver, PageGuard, PageSnapshot};
use crate::error::{NavigationError, PageError};
use crate::extract;
use crate::links::{self, DEFAULT_CANDIDATE_LIMIT};
use crate::models::{Cms, CrawlResult, ExtractedContent, LinkCandidate, SiteDetection, SkippedLink, Source, Story};
use crate::orchestrator::CrawlSettings;
use crate::utils::{domain_of, truncate_for_log};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use cnn_lite::CnnLiteStrategy;
pub use generic::GenericStrategy;
pub use hacker_news::HackerNewsStrategy;

pub const CANCELLED: &str = "cancelled";

/// Everything a strategy needs to crawl one source.
#[derive(Clone)]
pub struct CrawlContext {
    pub driver: Arc<dyn PageDriver>,
    pub cache: Arc<SiteDetectionCache>,
    pub settings: Arc<CrawlSettings>,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub cancel: CancellationToken,
    /// Reference instant for date normalization and relevance.
    pub now: DateTime<Utc>,
}

/// A crawl recipe for one kind of site.
///
/// The hooks operate on page snapshots only. Page acquisition, concurrency
/// and relevance filtering live in [`run`], which every strategy goes
/// through; a strategy cannot replace it.
pub trait SiteStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Link selectors tried before the detected ones.
    fn link_selectors(&self) -> &[&'static str] {
        &[]
    }

    /// Content selectors tried before the detected ones.
    fn content_selectors(&self) -> &[&'static str] {
        &[]
    }

    fn discover_links(
        &self,
        listing: &PageSnapshot,
        detection: &SiteDetection,
        source: &Source,
        limit: usize,
    ) -> Vec<LinkCandidate> {
        links::discover_links(
            listing,
            self.link_selectors(),
            detection,
            source.content_focus.as_deref(),
            limit,
        )
    }

    fn extract_content(&self, page: &PageSnapshot, detection: &SiteDetection) -> ExtractedContent {
        extract::extract(page, self.content_selectors(), detection)
    }

    fn relevance_policy(&self, source: &Source) -> RelevancePolicy {
        RelevancePolicy::with_timeframe_hours(source.timeframe_hours)
    }
}

/// Domain-keyed strategy table.
///
/// Lookup is pure: an exact host match wins, then the longest registered
/// parent domain, then the generic strategy.
pub struct StrategyRegistry {
    named: Vec<(String, Arc<dyn SiteStrategy>)>,
    generic: Arc<dyn SiteStrategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::empty()
            .register("lite.cnn.com", Arc::new(CnnLiteStrategy))
            .register("news.ycombinator.com", Arc::new(HackerNewsStrategy))
    }
}

impl StrategyRegistry {
    /// A registry that always resolves to the generic strategy.
    pub fn empty() -> Self {
        Self { named: Vec::new(), generic: Arc::new(GenericStrategy) }
    }

    pub fn register(mut self, domain: &str, strategy: Arc<dyn SiteStrategy>) -> Self {
        let domain = domain.trim().trim_start_matches("www.").to_lowercase();
        self.named.retain(|(d, _)| *d != domain);
        self.named.push((domain, strategy));
        self
    }

    pub fn resolve(&self, url: &str) -> Arc<dyn SiteStrategy> {
        let Some(host) = domain_of(url) else {
            return Arc::clone(&self.generic);
        };
        if let Some((_, strategy)) = self.named.iter().find(|(domain, _)| *domain == host) {
            return Arc::clone(strategy);
        }
        self.named
            .iter()
            .filter(|(domain, _)| host.ends_with(&format!(".{domain}")))
            .max_by_key(|(domain, _)| domain.len())
            .map(|(_, strategy)| Arc::clone(strategy))
            .unwrap_or_else(|| Arc::clone(&self.generic))
    }
}

/// Candidates considered for a source: enough headroom to survive skips.
pub fn candidate_limit(max_items: usize) -> usize {
    DEFAULT_CANDIDATE_LIMIT.max(max_items.saturating_mul(3))
}

enum LinkOutcome {
    Accepted(Box<Story>),
    Skipped(SkippedLink),
}

/// Open `url`, capture its snapshot and close the page on every path.
pub async fn fetch_snapshot(ctx: &CrawlContext, url: &str) -> Result<PageSnapshot, PageError> {
    let settings = &ctx.settings;
    let fetch = async {
        let page = PageGuard::open(Arc::clone(&ctx.driver), url, settings.navigation_timeout).await?;
        let snapshot = page.snapshot(settings.eval_timeout).await;
        page.close().await;
        Ok::<_, PageError>(snapshot?)
    };
    tokio::select! {
        result = fetch => result,
        _ = ctx.cancel.cancelled() => Err(NavigationError::Cancelled.into()),
    }
}

/// The shared pipeline: listing, detection, discovery, then per-link fetch,
/// extraction, date normalization and relevance filtering.
///
/// Links are fetched `link_concurrency` at a time in ranked order; stories
/// keep ranked order regardless of completion order.
#[instrument(level = "info", skip_all, fields(url = %source.url, strategy = strategy.name()))]
pub async fn run<S>(strategy: &S, ctx: &CrawlContext, source: &Source) -> CrawlResult
where
    S: SiteStrategy + ?Sized,
{
    let mut result = CrawlResult::new(&source.url);

    let listing = match fetch_snapshot(ctx, &source.url).await {
        Ok(listing) => listing,
        Err(e) => {
            warn!(error = %e, "Listing page unavailable");
            return CrawlResult::failed(&source.url, error_text(&e));
        }
    };
    let detection = ctx.cache.get_or_classify(&listing);
    result.site_info = detection.clone();

    let candidates = strategy.discover_links(&listing, &detection, source, candidate_limit(source.max_items));
    info!(count = candidates.len(), "Discovered candidate links");
    if candidates.is_empty() {
        return result;
    }

    let filter = DateRelevanceFilter::new(ctx.now, ctx.settings.target_date, strategy.relevance_policy(source));
    let normalizer = DateNormalizer::at(ctx.now);
    let width = ctx.settings.link_concurrency.max(1);
    let mut chunks = candidates.chunks(width).peekable();

    while let Some(chunk) = chunks.next() {
        if ctx.cancel.is_cancelled() {
            result.error = Some(CANCELLED.to_string());
            break;
        }

        let fetches: Vec<_> = chunk
            .iter()
            .enumerate()
            .map(|(index, candidate)| {
                let detection = &detection;
                let filter = &filter;
                let normalizer = &normalizer;
                async move {
                    let outcome = process_link(strategy, ctx, detection, candidate, normalizer, filter).await;
                    (index, outcome)
                }
            })
            .collect();
        let mut outcomes: Vec<(usize, LinkOutcome)> = stream::iter(fetches).buffer_unordered(width).collect().await;
        outcomes.sort_by_key(|(index, _)| *index);

        for (_, outcome) in outcomes {
            match outcome {
                LinkOutcome::Accepted(story) if result.stories.len() < source.max_items => {
                    result.stories.push(*story);
                }
                LinkOutcome::Accepted(story) => debug!(link = %story.link, "Dropping story beyond max_items"),
                LinkOutcome::Skipped(skipped) => result.skipped.push(skipped),
            }
        }

        if result.stories.len() >= source.max_items {
            break;
        }
        if chunks.peek().is_some() && !ctx.settings.request_delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(ctx.settings.request_delay) => {}
                _ = ctx.cancel.cancelled() => {}
            }
        }
    }

    if ctx.cancel.is_cancelled() && result.error.is_none() {
        result.error = Some(CANCELLED.to_string());
    }
    info!(
        stories = result.stories.len(),
        skipped = result.skipped.len(),
        "Source crawl finished"
    );
    result
}

#[instrument(level = "debug", skip_all, fields(href = %candidate.href))]
async fn process_link<S>(
    strategy: &S,
    ctx: &CrawlContext,
    listing_detection: &SiteDetection,
    candidate: &LinkCandidate,
    normalizer: &DateNormalizer,
    filter: &DateRelevanceFilter,
) -> LinkOutcome
where
    S: SiteStrategy + ?Sized,
{
    let skip = |reason: String| {
        debug!(%reason, "Skipping candidate");
        LinkOutcome::Skipped(SkippedLink { href: candidate.href.clone(), reason })
    };

    let page = match fetch_snapshot(ctx, &candidate.href).await {
        Ok(page) => page,
        Err(e) => return skip(error_text(&e)),
    };

    let mut detection = ctx.cache.get_or_classify(&page);
    if detection.cms == Cms::Unknown {
        detection.cms = listing_detection.cms;
    }
    let content = strategy.extract_content(&page, &detection);
    if content.is_empty() {
        return skip("empty content".to_string());
    }

    let raw_date = content.raw_date_text.as_deref().or(candidate.raw_date_text.as_deref());
    let date_posted = raw_date.map(|raw| normalizer.normalize(raw));
    if !filter.is_relevant(date_posted.as_ref()) {
        let shown = date_posted.as_ref().map(ToString::to_string).unwrap_or_default();
        return skip(format!("outside relevance window ({shown})"));
    }

    let headline = content
        .title_hint
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| candidate.text.clone());
    let tags = classify_story(ctx, &content.text).await;

    LinkOutcome::Accepted(Box::new(Story {
        headline,
        link: candidate.href.clone(),
        date_posted,
        full_content: content.text,
        image_urls: content.images,
        video_urls: content.videos,
        popularity: candidate.popularity.clone(),
        source: domain_of(&candidate.href).unwrap_or_default(),
        tags,
    }))
}

async fn classify_story(ctx: &CrawlContext, text: &str) -> Vec<String> {
    let Some(classifier) = &ctx.classifier else {
        return Vec::new();
    };
    let request = ClassificationRequest {
        text: text.to_string(),
        candidate_categories: ctx.settings.categories.clone(),
    };
    match classifier.classify(request).await {
        Ok(classification) => classification.tags(),
        Err(e) => {
            warn!(error = %e, text = %truncate_for_log(text, 80), "Classification failed; leaving tags empty");
            Vec::new()
        }
    }
}

fn error_text(e: &PageError) -> String {
    match e {
        PageError::Navigation(NavigationError::Cancelled) => CANCELLED.to_string(),
        other => other.to_string(),
    }
}
