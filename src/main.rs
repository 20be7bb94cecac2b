//! # Dynamic Crawl
//!
//! Crawls a list of sources, discovers their most recent articles, extracts
//! the content and writes the results as JSON for the downstream
//! categorization step.
//!
//! ## Usage
//!
//! ```sh
//! dynamic_crawl -s '["https://lite.cnn.com", "https://news.ycombinator.com"]' -o ./out/results.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Configuration**: parse sources and overrides; any error aborts here
//! 2. **Crawl**: each source runs through its site strategy with bounded concurrency
//! 3. **Output**: results are written atomically, also after Ctrl-C

use clap::Parser;
use dynamic_crawl::config::{CrawlConfig, parse_target_date};
use dynamic_crawl::driver::PageDriver;
use dynamic_crawl::driver::http::{DEFAULT_USER_AGENT, HttpPageDriver};
use dynamic_crawl::driver::retry::RetryDriver;
use dynamic_crawl::error::ConfigError;
use dynamic_crawl::orchestrator::{CrawlOrchestrator, CrawlSettings};
use dynamic_crawl::outputs::json;
use dynamic_crawl::utils::ensure_writable_dir;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;

use cli::Cli;

/// Sources and global overrides from the command line and/or a file.
async fn load_config(args: &Cli) -> Result<CrawlConfig, ConfigError> {
    let config = match (&args.sources, &args.sources_file) {
        (Some(inline), _) => CrawlConfig::from_json(inline)?,
        (None, Some(path)) => CrawlConfig::load(Path::new(path)).await?,
        (None, None) => return Err(ConfigError::NoSources),
    };
    let target_date = args.target_date.as_deref().map(parse_target_date).transpose()?;
    Ok(config.with_overrides(args.content_focus.clone(), target_date, args.timeframe_hours))
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("dynamic_crawl starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.sources_file, %args.output, "Parsed CLI arguments");

    // --- Configuration (fatal on error) ---
    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid crawl configuration");
            return Err(e.into());
        }
    };
    let sources = config.sources().inspect_err(|e| error!(error = %e, "Invalid source list"))?;
    info!(count = sources.len(), target_date = ?config.target_date, "Sources configured");

    // Early check: ensure output dir is writable
    let output = Path::new(&args.output);
    if let Err(e) = ensure_writable_dir(output).await {
        error!(
            path = %args.output,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Page driver ----
    let mut builder = CrawlSettings::builder()
        .source_concurrency(args.concurrency)
        .link_concurrency(args.link_concurrency)
        .request_delay(Duration::from_millis(args.request_delay_ms))
        .navigation_timeout(Duration::from_secs(args.navigation_timeout_secs))
        .eval_timeout(Duration::from_secs(args.eval_timeout_secs))
        .source_timeout(Duration::from_secs(args.source_timeout_secs))
        .max_retries(args.max_retries)
        .target_date(config.target_date)
        .user_agent(args.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()));
    if let Some(categories) = config.categories.clone() {
        builder = builder.categories(categories);
    }
    let settings = builder.build();

    let http = HttpPageDriver::new(&settings.user_agent)?;
    let driver: Arc<dyn PageDriver> =
        Arc::new(RetryDriver::new(http, settings.max_retries, settings.retry_base_delay));

    // ---- Crawl, cancellable with Ctrl-C ----
    let orchestrator = CrawlOrchestrator::new(driver, settings);
    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received; cancelling crawl and keeping partial results");
            cancel.cancel();
        }
    });

    let results = orchestrator.crawl_all(&sources).await;

    // ---- Output ----
    if let Err(e) = json::write_results(&results, output).await {
        error!(error = %e, "Failed to write crawl results");
        return Err(e.into());
    }

    let stories: usize = results.iter().map(|r| r.stories.len()).sum();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let elapsed = start_time.elapsed();
    info!(
        sources = results.len(),
        stories,
        failed,
        elapsed_secs = elapsed.as_secs_f64(),
        "dynamic_crawl complete"
    );

    Ok(())
}
