//! Error taxonomy for the crawl pipeline.
//!
//! Every stage boundary returns one of these types instead of swallowing
//! failures. Callers decide the fallback:
//!
//! | Error | Scope | Recovery |
//! |-------|-------|----------|
//! | [`NavigationError`] | source or link | `CrawlResult.error` or a skipped link |
//! | [`EvalError`] | one page | wrapped into [`ExtractionError`] |
//! | [`ExtractionError`] | one page | empty `ExtractedContent` / unknown detection |
//! | [`ParseError`] | one date string | `NormalizedDate::Unparsed` |
//! | [`ConfigError`] | whole run | abort before crawling |
//! | [`OutputError`] | whole run | reported by the binary |

use thiserror::Error;

/// A page could not be reached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavigationError {
    /// Navigation did not finish within the allotted time.
    #[error("navigation to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// Transport-level failure (DNS, TLS, connection reset, ...).
    #[error("{url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    /// The URL could not be parsed.
    #[error("invalid URL {0}")]
    InvalidUrl(String),

    /// The crawl was cancelled while navigating.
    #[error("navigation cancelled")]
    Cancelled,
}

impl NavigationError {
    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            NavigationError::Unreachable { .. } => true,
            NavigationError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A script evaluation inside a page failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("script failed: {0}")]
    Script(String),

    #[error("driver does not support this script")]
    Unsupported,

    #[error("page handle {0} is not open")]
    PageClosed(u64),

    #[error("evaluation timed out after {0}s")]
    Timeout(u64),

    #[error("malformed evaluation result: {0}")]
    Malformed(String),
}

/// DOM inspection of a fetched page failed.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("invalid selector `{0}`")]
    Selector(String),

    #[error("page snapshot is empty")]
    EmptySnapshot,

    #[error("page URL `{0}` is not absolute")]
    BaseUrl(String),
}

/// Opening a page or capturing its snapshot failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A date expression matched none of the parsing tiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unparseable date text `{0}`")]
pub struct ParseError(pub String);

/// Invalid crawl configuration. Fatal to the whole run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed source list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("no sources configured")]
    NoSources,

    #[error("source `{0}` is not a valid http(s) URL")]
    InvalidSource(String),

    #[error("target date `{0}` is not an ISO date (YYYY-MM-DD)")]
    InvalidTargetDate(String),

    #[error("{0}")]
    Invalid(String),
}

/// Persisting crawl results failed.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("could not serialize results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not write results: {0}")]
    Io(#[from] std::io::Error),
}
