//! Crawl orchestration across sources.
//!
//! [`CrawlOrchestrator`] owns the shared state of one crawl run (page driver,
//! strategy table, site-detection cache, cancellation token) and drives the
//! configured sources with bounded concurrency. Each source is crawled by the
//! strategy its URL resolves to, under a per-source timeout. A failing source
//! yields a [`CrawlResult`] with `error` set; it never aborts the run.
//!
//! Results come back in the order the sources were configured.

use crate::classifier::Classifier;
use crate::detect::SiteDetectionCache;
use crate::driver::PageDriver;
use crate::driver::http::DEFAULT_USER_AGENT;
use crate::models::{CrawlResult, Source};
use crate::strategies::{self, CANCELLED, CrawlContext, StrategyRegistry};
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Categories offered to an attached classifier.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Model Updates",
    "Research Trends",
    "Market Trends",
    "Developer Tools",
    "Industry Applications",
    "Ethics and Regulation",
    "Open Source",
    "Fundamental Research",
    "General",
];

/// Runtime knobs of a crawl run.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Sources crawled at the same time.
    pub source_concurrency: usize,
    /// Candidate links fetched at the same time within one source.
    pub link_concurrency: usize,
    /// Pause between link batches within one source.
    pub request_delay: Duration,
    pub navigation_timeout: Duration,
    pub eval_timeout: Duration,
    /// Upper bound for crawling one source end to end.
    pub source_timeout: Duration,
    /// Retries for transient navigation failures.
    pub max_retries: usize,
    pub retry_base_delay: Duration,
    /// Stories published before this day are dropped.
    pub target_date: Option<NaiveDate>,
    pub user_agent: String,
    pub categories: Vec<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            source_concurrency: 2,
            link_concurrency: 2,
            request_delay: Duration::from_secs(2),
            navigation_timeout: Duration::from_secs(60),
            eval_timeout: Duration::from_secs(15),
            source_timeout: Duration::from_secs(300),
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            target_date: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl CrawlSettings {
    /// A builder starting from [`CrawlSettings::default`].
    pub fn builder() -> CrawlSettingsBuilder {
        CrawlSettingsBuilder::new()
    }
}

/// Builder for [`CrawlSettings`]
#[derive(Debug, Default)]
pub struct CrawlSettingsBuilder {
    settings: CrawlSettings,
}

impl CrawlSettingsBuilder {
    pub fn new() -> Self {
        Self { settings: CrawlSettings::default() }
    }

    /// Sources crawled at the same time.
    ///
    /// # Arguments
    ///
    /// * `n` - Concurrency limit; zero is treated as one
    pub fn source_concurrency(mut self, n: usize) -> Self {
        self.settings.source_concurrency = n.max(1);
        self
    }

    /// Article pages fetched at the same time within one source. Each one
    /// holds an open page, so keep this small.
    ///
    /// # Arguments
    ///
    /// * `n` - Concurrency limit; zero is treated as one
    pub fn link_concurrency(mut self, n: usize) -> Self {
        self.settings.link_concurrency = n.max(1);
        self
    }

    /// Pause between link batches of one source. `Duration::ZERO` disables it.
    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.settings.request_delay = delay;
        self
    }

    /// Bound for a single page navigation.
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.settings.navigation_timeout = timeout;
        self
    }

    /// Bound for capturing a page snapshot.
    pub fn eval_timeout(mut self, timeout: Duration) -> Self {
        self.settings.eval_timeout = timeout;
        self
    }

    /// Bound for crawling one source end to end. Stories accepted before it
    /// expires are kept.
    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.settings.source_timeout = timeout;
        self
    }

    /// Retries for transient navigation failures, used by the binary's
    /// retrying driver.
    pub fn max_retries(mut self, retries: usize) -> Self {
        self.settings.max_retries = retries;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.settings.retry_base_delay = delay;
        self
    }

    /// Drop stories published before this day, regardless of the window.
    pub fn target_date(mut self, date: Option<NaiveDate>) -> Self {
        self.settings.target_date = date;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = user_agent.into();
        self
    }

    /// Categories offered to an attached classifier.
    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.settings.categories = categories;
        self
    }

    pub fn build(self) -> CrawlSettings {
        self.settings
    }
}

/// Drives a crawl run over many sources.
///
/// Owns the state shared by every source of one run: the page driver, the
/// strategy table, the site-detection cache and the cancellation token. The
/// cache lives exactly as long as the orchestrator.
///
/// # Examples
///
/// ```ignore
/// let orchestrator = CrawlOrchestrator::new(driver, CrawlSettings::default());
/// let results = orchestrator.crawl_all(&[Source::new("https://lite.cnn.com/")]).await;
/// ```
pub struct CrawlOrchestrator {
    driver: Arc<dyn PageDriver>,
    registry: StrategyRegistry,
    cache: Arc<SiteDetectionCache>,
    settings: Arc<CrawlSettings>,
    classifier: Option<Arc<dyn Classifier>>,
    cancel: CancellationToken,
    now: Option<DateTime<Utc>>,
}

impl CrawlOrchestrator {
    /// Create an orchestrator with the default strategy table.
    ///
    /// # Arguments
    ///
    /// * `driver` - Page driver shared by all sources; each fetch opens its own page
    /// * `settings` - Concurrency, timeouts and filters for this run
    pub fn new(driver: Arc<dyn PageDriver>, settings: CrawlSettings) -> Self {
        Self {
            driver,
            registry: StrategyRegistry::default(),
            cache: Arc::new(SiteDetectionCache::new()),
            settings: Arc::new(settings),
            classifier: None,
            cancel: CancellationToken::new(),
            now: None,
        }
    }

    pub fn with_registry(mut self, registry: StrategyRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Pin the reference instant used for relative dates and windows.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cache(&self) -> &SiteDetectionCache {
        &self.cache
    }

    fn context(&self) -> CrawlContext {
        CrawlContext {
            driver: Arc::clone(&self.driver),
            cache: Arc::clone(&self.cache),
            settings: Arc::clone(&self.settings),
            classifier: self.classifier.clone(),
            cancel: self.cancel.clone(),
            now: self.now.unwrap_or_else(Utc::now),
        }
    }

    /// Crawl every source, at most `source_concurrency` at a time.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn crawl_all(&self, sources: &[Source]) -> Vec<CrawlResult> {
        let started = Instant::now();
        let ctx = self.context();
        let results: Vec<CrawlResult> = stream::iter(sources)
            .map(|source| self.crawl_source(&ctx, source))
            .buffered(self.settings.source_concurrency.max(1))
            .collect()
            .await;

        let stories: usize = results.iter().map(|r| r.stories.len()).sum();
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        info!(
            stories,
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Crawl finished"
        );
        results
    }

    /// Crawl one source with its resolved strategy, bounded by `source_timeout`.
    ///
    /// The timeout cancels the source through a child token, so stories
    /// accepted before it fired are kept and open pages are closed.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Shared run context; its token cancels every source
    /// * `source` - The source to crawl
    ///
    /// # Returns
    ///
    /// The source's [`CrawlResult`]. `error` is `"cancelled"` after a run-wide
    /// cancellation and `"source timed out after <n>ms"` after a timeout.
    #[instrument(level = "info", skip_all, fields(url = %source.url))]
    pub async fn crawl_source(&self, ctx: &CrawlContext, source: &Source) -> CrawlResult {
        if ctx.cancel.is_cancelled() {
            return CrawlResult::failed(&source.url, CANCELLED);
        }
        let strategy = self.registry.resolve(&source.url);
        info!(strategy = strategy.name(), max_items = source.max_items, "Crawling source");

        let source_ctx = CrawlContext { cancel: ctx.cancel.child_token(), ..ctx.clone() };
        let limit = self.settings.source_timeout;
        let deadline = source_ctx.cancel.clone();
        let watchdog = tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            deadline.cancel();
        });

        let mut result = strategies::run(strategy.as_ref(), &source_ctx, source).await;
        watchdog.abort();

        let timed_out = source_ctx.cancel.is_cancelled();
        if timed_out && !ctx.cancel.is_cancelled() {
            let millis = limit.as_millis() as u64;
            warn!(millis, stories = result.stories.len(), "Source timed out; keeping partial results");
            result.error = Some(format!("source timed out after {millis}ms"));
        }
        result
    }
}
