//! Command-line interface definitions for the crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use clap::Parser;

/// Command-line arguments for the crawler.
///
/// Sources come either inline (`--sources`, JSON) or from a file
/// (`--sources-file`, JSON or YAML). Global overrides given here win over
/// the ones in the file.
///
/// # Examples
///
/// ```sh
/// # Two sources, one story each
/// dynamic_crawl -s '["https://lite.cnn.com", "https://news.ycombinator.com"]' -o ./out/results.json
///
/// # From a YAML file, only stories from 2025-05-01 on
/// dynamic_crawl -f sources.yaml -o ./out/results.json --target-date 2025-05-01
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Inline JSON source list or configuration object
    #[arg(short, long, env = "CRAWL_SOURCES", conflicts_with = "sources_file")]
    pub sources: Option<String>,

    /// Path to a JSON or YAML configuration file
    #[arg(short = 'f', long, env = "CRAWL_SOURCES_FILE")]
    pub sources_file: Option<String>,

    /// Where to write the JSON results
    #[arg(short, long, env = "CRAWL_OUTPUT", default_value = "crawl_results.json")]
    pub output: String,

    /// Drop stories published before this day (YYYY-MM-DD)
    #[arg(long, env = "CRAWL_TARGET_DATE")]
    pub target_date: Option<String>,

    /// Topic phrase used to boost matching links
    #[arg(long, env = "CRAWL_CONTENT_FOCUS")]
    pub content_focus: Option<String>,

    /// Relevance window in hours
    #[arg(long, env = "CRAWL_TIMEFRAME_HOURS")]
    pub timeframe_hours: Option<u32>,

    /// Sources crawled at the same time
    #[arg(long, env = "CRAWL_CONCURRENCY", default_value_t = 2)]
    pub concurrency: usize,

    /// Article pages fetched at the same time within one source
    #[arg(long, env = "CRAWL_LINK_CONCURRENCY", default_value_t = 2)]
    pub link_concurrency: usize,

    /// Pause between article fetches within one source
    #[arg(long, env = "CRAWL_REQUEST_DELAY_MS", default_value_t = 2000)]
    pub request_delay_ms: u64,

    #[arg(long, env = "CRAWL_NAVIGATION_TIMEOUT_SECS", default_value_t = 60)]
    pub navigation_timeout_secs: u64,

    #[arg(long, env = "CRAWL_EVAL_TIMEOUT_SECS", default_value_t = 15)]
    pub eval_timeout_secs: u64,

    /// Upper bound for crawling one source end to end
    #[arg(long, env = "CRAWL_SOURCE_TIMEOUT_SECS", default_value_t = 300)]
    pub source_timeout_secs: u64,

    /// Retries for transient navigation failures
    #[arg(long, env = "CRAWL_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: usize,

    /// User agent sent with every request
    #[arg(long, env = "CRAWL_USER_AGENT")]
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "dynamic_crawl",
            "--sources",
            r#"["https://example.com"]"#,
            "--output",
            "./out/results.json",
            "--timeframe-hours",
            "24",
        ]);

        assert_eq!(cli.sources.as_deref(), Some(r#"["https://example.com"]"#));
        assert_eq!(cli.output, "./out/results.json");
        assert_eq!(cli.timeframe_hours, Some(24));
        assert_eq!(cli.concurrency, 2);
        assert_eq!(cli.request_delay_ms, 2000);
        assert_eq!(cli.max_retries, 2);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["dynamic_crawl", "-f", "/tmp/sources.yaml", "-o", "/tmp/out.json"]);

        assert_eq!(cli.sources_file.as_deref(), Some("/tmp/sources.yaml"));
        assert_eq!(cli.output, "/tmp/out.json");
        assert_eq!(cli.sources, None);
    }

    #[test]
    fn test_inline_and_file_sources_conflict() {
        let parsed = Cli::try_parse_from(["dynamic_crawl", "-s", "[]", "-f", "x.yaml"]);
        assert!(parsed.is_err());
    }
}
