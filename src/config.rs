//! Crawl configuration: the source list and its global overrides.
//!
//! Accepted shapes, in JSON or YAML:
//!
//! ```text
//! ["https://a.example", {"url": "https://b.example", "maxItems": 3}]
//!
//! {"sources": [...], "contentFocus": "rust", "targetDate": "2024-01-01", "timeframeHours": 24}
//! ```
//!
//! Source entries accept `url` or `identifier`, and both camelCase and
//! snake_case keys. Missing values fall back to `maxItems = 1` and
//! `timeframeHours = 48`. Any problem here is fatal to the run.

use crate::dates::relevance::DEFAULT_TIMEFRAME_HOURS;
use crate::error::ConfigError;
use crate::models::{DEFAULT_MAX_ITEMS, Source};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// One source entry as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    #[serde(alias = "identifier")]
    pub url: String,
    #[serde(default, alias = "max_items")]
    pub max_items: Option<usize>,
    #[serde(default, alias = "content_focus")]
    pub content_focus: Option<String>,
    #[serde(default, alias = "timeframe_hours")]
    pub timeframe_hours: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourceEntry {
    Url(String),
    Spec(SourceSpec),
}

impl From<SourceEntry> for SourceSpec {
    fn from(entry: SourceEntry) -> Self {
        match entry {
            SourceEntry::Url(url) => SourceSpec { url, ..SourceSpec::default() },
            SourceEntry::Spec(spec) => spec,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    sources: Vec<SourceEntry>,
    #[serde(default, alias = "content_focus")]
    content_focus: Option<String>,
    #[serde(default, alias = "target_date")]
    target_date: Option<String>,
    #[serde(default, alias = "timeframe_hours")]
    timeframe_hours: Option<u32>,
    #[serde(default)]
    categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    List(Vec<SourceEntry>),
    Full(ConfigFile),
}

/// Parsed configuration, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlConfig {
    pub entries: Vec<SourceSpec>,
    pub content_focus: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub timeframe_hours: Option<u32>,
    pub categories: Option<Vec<String>>,
}

impl CrawlConfig {
    fn from_document(document: ConfigDocument) -> Result<Self, ConfigError> {
        match document {
            ConfigDocument::List(entries) => Ok(Self {
                entries: entries.into_iter().map(SourceSpec::from).collect(),
                ..Self::default()
            }),
            ConfigDocument::Full(file) => Ok(Self {
                entries: file.sources.into_iter().map(SourceSpec::from).collect(),
                content_focus: file.content_focus,
                target_date: file.target_date.as_deref().map(parse_target_date).transpose()?,
                timeframe_hours: file.timeframe_hours,
                categories: file.categories,
            }),
        }
    }

    /// Parse a JSON source list or configuration object.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Self::from_document(serde_json::from_str(raw)?)
    }

    /// Parse a YAML source list or configuration object.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Self::from_document(serde_yaml::from_str(raw)?)
    }

    /// Load a configuration file; `.json` is parsed as JSON, anything else as YAML.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config = if is_json { Self::from_json(&raw)? } else { Self::from_yaml(&raw)? };
        info!(sources = config.entries.len(), "Loaded crawl configuration");
        Ok(config)
    }

    /// Command-line values win over file values.
    pub fn with_overrides(
        mut self,
        content_focus: Option<String>,
        target_date: Option<NaiveDate>,
        timeframe_hours: Option<u32>,
    ) -> Self {
        self.content_focus = content_focus.or(self.content_focus);
        self.target_date = target_date.or(self.target_date);
        self.timeframe_hours = timeframe_hours.or(self.timeframe_hours);
        self
    }

    /// Validated sources with defaults and global overrides applied.
    pub fn sources(&self) -> Result<Vec<Source>, ConfigError> {
        if self.entries.is_empty() {
            return Err(ConfigError::NoSources);
        }
        self.entries.iter().map(|spec| self.build_source(spec)).collect()
    }

    fn build_source(&self, spec: &SourceSpec) -> Result<Source, ConfigError> {
        let url = spec.url.trim();
        let valid = Url::parse(url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            return Err(ConfigError::InvalidSource(spec.url.clone()));
        }
        let max_items = spec.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
        if max_items == 0 {
            return Err(ConfigError::Invalid(format!("source `{url}` has maxItems = 0")));
        }
        let focus = spec
            .content_focus
            .clone()
            .or_else(|| self.content_focus.clone())
            .filter(|f| !f.trim().is_empty());

        Ok(Source::new(url)
            .max_items(max_items)
            .content_focus(focus)
            .timeframe_hours(spec.timeframe_hours.or(self.timeframe_hours).unwrap_or(DEFAULT_TIMEFRAME_HOURS)))
    }
}

/// `YYYY-MM-DD`.
pub fn parse_target_date(raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| ConfigError::InvalidTargetDate(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bare_list_with_mixed_entries() {
        let config = CrawlConfig::from_json(
            r#"["https://a.example/", {"identifier": "https://b.example/", "max_items": 3}, {"url": "https://c.example/", "maxItems": 2, "timeframeHours": 12}]"#,
        )
        .unwrap();
        let sources = config.sources().unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0], Source::new("https://a.example/"));
        assert_eq!(sources[1].url, "https://b.example/");
        assert_eq!(sources[1].max_items, 3);
        assert_eq!(sources[1].timeframe_hours, 48);
        assert_eq!(sources[2].max_items, 2);
        assert_eq!(sources[2].timeframe_hours, 12);
    }

    #[test]
    fn test_object_with_globals() {
        let config = CrawlConfig::from_json(
            r#"{"sources": ["https://a.example/", {"url": "https://b.example/", "contentFocus": "chips"}],
                "contentFocus": "rust compiler", "targetDate": "2024-01-01", "timeframeHours": 24}"#,
        )
        .unwrap();
        assert_eq!(config.target_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        let sources = config.sources().unwrap();
        assert_eq!(sources[0].content_focus.as_deref(), Some("rust compiler"));
        assert_eq!(sources[0].timeframe_hours, 24);
        assert_eq!(sources[1].content_focus.as_deref(), Some("chips"));
    }

    #[tokio::test]
    async fn test_yaml_file_and_overrides() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "sources:\n  - https://a.example/\n  - url: https://b.example/\n    max_items: 4\ntimeframe_hours: 72\ncategories: [AI, Chips]"
        )
        .unwrap();

        let config = CrawlConfig::load(file.path()).await.unwrap();
        assert_eq!(config.categories, Some(vec!["AI".to_string(), "Chips".to_string()]));

        let config = config.with_overrides(Some("robots".to_string()), None, Some(6));
        let sources = config.sources().unwrap();
        assert_eq!(sources[1].max_items, 4);
        assert!(sources.iter().all(|s| s.timeframe_hours == 6));
        assert!(sources.iter().all(|s| s.content_focus.as_deref() == Some("robots")));
    }

    #[test]
    fn test_invalid_configurations_are_rejected() {
        assert!(matches!(CrawlConfig::from_json("{not json"), Err(ConfigError::Json(_))));
        assert!(matches!(CrawlConfig::from_json("[]").unwrap().sources(), Err(ConfigError::NoSources)));
        assert!(matches!(
            CrawlConfig::from_json(r#"["ftp://files.example/"]"#).unwrap().sources(),
            Err(ConfigError::InvalidSource(_))
        ));
        assert!(matches!(
            CrawlConfig::from_json(r#"[{"url": "https://a.example/", "maxItems": 0}]"#).unwrap().sources(),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CrawlConfig::from_json(r#"{"sources": [], "targetDate": "01/02/2024"}"#),
            Err(ConfigError::InvalidTargetDate(_))
        ));
    }

    #[test]
    fn test_parse_target_date() {
        assert_eq!(parse_target_date(" 2024-02-29 ").unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert!(parse_target_date("2023-02-29").is_err());
    }
}
