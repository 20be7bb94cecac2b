//! Tolerant publish-date parsing.
//!
//! Parsing tiers, first success wins:
//!
//! 1. "now" phrases (`today`, `just now`, `방금`, ...) unless a year is present
//! 2. "yesterday" phrases (`yesterday`, `어제`), same condition
//! 3. relative quantities (`3 days ago`, `2시간 전`)
//! 4. strict ISO-8601 / RFC 3339 / RFC 2822
//! 5. a fixed catalog of explicit formats
//! 6. a fuzzy scan for an embedded date (year-first, month-before-day)
//!
//! Output is a UTC calendar date. Text that matches no tier is kept verbatim
//! as [`NormalizedDate::Unparsed`].

use crate::error::ParseError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tracing::debug;

/// Canonical output format.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d";

/// A publish date after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NormalizedDate {
    /// A UTC calendar date, rendered as `YYYY-MM-DD`.
    Parsed(NaiveDate),
    /// The original text, which no parsing tier understood.
    Unparsed(String),
}

impl NormalizedDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            NormalizedDate::Parsed(d) => Some(*d),
            NormalizedDate::Unparsed(_) => None,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, NormalizedDate::Parsed(_))
    }
}

impl fmt::Display for NormalizedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedDate::Parsed(d) => write!(f, "{}", d.format(CANONICAL_FORMAT)),
            NormalizedDate::Unparsed(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for NormalizedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NormalizedDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match NaiveDate::parse_from_str(&raw, CANONICAL_FORMAT) {
            Ok(d) => NormalizedDate::Parsed(d),
            Err(_) => NormalizedDate::Unparsed(raw),
        })
    }
}

static NOW_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:just now|right now|moments ago|a moment ago|today)\b").expect("NOW_EN should compile")
});

static YESTERDAY_EN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\byesterday\b").expect("YESTERDAY_EN should compile"));

static NOW_KO: &[&str] = &["방금", "지금", "오늘"];
static YESTERDAY_KO: &[&str] = &["어제"];

/// A four-digit year anywhere in the text means an explicit date is present.
static EXPLICIT_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\D)(?:19|20)\d{2}(?:\D|$)").expect("EXPLICIT_YEAR should compile"));

static RELATIVE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d+|an?|one)\s*(seconds?|secs?|s|minutes?|mins?|hours?|hrs?|h|days?|d|weeks?|wks?|w|months?|mos?|years?|yrs?|y)\s+ago\b",
    )
    .expect("RELATIVE_EN should compile")
});

static RELATIVE_KO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)\s*(초|분|시간|일|주|개월|달|년)\s*전").expect("RELATIVE_KO should compile")
});

static ISO_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2} \d").expect("ISO_SPACE should compile"));

/// Explicit formats, tried in order against the whole (trimmed) string.
const FORMAT_CATALOG: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%Y년 %m월 %d일",
    "%Y. %m. %d.",
    "%Y.%m.%d.",
    "%Y.%m.%d",
    "%Y%m%d",
];

const DATETIME_CATALOG: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%Y. %m. %d. %H:%M",
];

const MONTH_NAMES: &str = r"(jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?";

static FUZZY_YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})\s*[-/.년]\s*(\d{1,2})\s*[-/.월]\s*(\d{1,2})").expect("FUZZY_YMD should compile")
});

static FUZZY_MDY_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{MONTH_NAMES}\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})"))
        .expect("FUZZY_MDY_NAMED should compile")
});

static FUZZY_DMY_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+{MONTH_NAMES},?\s+(\d{{4}})"))
        .expect("FUZZY_DMY_NAMED should compile")
});

static FUZZY_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})\b").expect("FUZZY_NUMERIC should compile")
});

static FUZZY_MD_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{MONTH_NAMES}\s+(\d{{1,2}})(?:st|nd|rd|th)?\b"))
        .expect("FUZZY_MD_NAMED should compile")
});

/// Parses date expressions relative to a fixed reference instant.
///
/// The reference instant is captured once per crawl run so every story of
/// the run is judged against the same "now".
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    now: DateTime<Utc>,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self { now: Utc::now() }
    }

    /// A normalizer whose "now" is `now`.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Normalize `raw`, keeping it verbatim when no tier matches.
    pub fn normalize(&self, raw: &str) -> NormalizedDate {
        match self.parse(raw) {
            Ok(date) => NormalizedDate::Parsed(date),
            Err(ParseError(original)) => {
                debug!(raw = %original, "Date text left unparsed");
                NormalizedDate::Unparsed(original)
            }
        }
    }

    /// Parse `raw` into a UTC calendar date.
    pub fn parse(&self, raw: &str) -> Result<NaiveDate, ParseError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(ParseError(raw.to_string()));
        }
        let lower = text.to_lowercase();
        let today = self.now.date_naive();

        if !EXPLICIT_YEAR.is_match(text) {
            if NOW_EN.is_match(&lower) || NOW_KO.iter().any(|p| lower.contains(p)) {
                return Ok(today);
            }
            if YESTERDAY_EN.is_match(&lower) || YESTERDAY_KO.iter().any(|p| lower.contains(p)) {
                return Ok(today - Duration::days(1));
            }
        }
        if let Some(date) = self.parse_relative(&lower) {
            return Ok(date);
        }
        if let Some(date) = parse_iso(text) {
            return Ok(date);
        }
        if let Some(date) = parse_catalog(text) {
            return Ok(date);
        }
        if let Some(date) = self.parse_fuzzy(text) {
            return Ok(date);
        }
        Err(ParseError(raw.to_string()))
    }

    fn parse_relative(&self, lower: &str) -> Option<NaiveDate> {
        if let Some(caps) = RELATIVE_EN.captures(lower) {
            let amount = match &caps[1] {
                "a" | "an" | "one" => 1,
                n => n.parse::<u32>().ok()?,
            };
            let unit = match &caps[2] {
                "s" | "sec" | "secs" | "second" | "seconds" => RelativeUnit::Seconds,
                "min" | "mins" | "minute" | "minutes" => RelativeUnit::Minutes,
                "h" | "hr" | "hrs" | "hour" | "hours" => RelativeUnit::Hours,
                "d" | "day" | "days" => RelativeUnit::Days,
                "w" | "wk" | "wks" | "week" | "weeks" => RelativeUnit::Weeks,
                "mo" | "mos" | "month" | "months" => RelativeUnit::Months,
                _ => RelativeUnit::Years,
            };
            return self.subtract(amount, unit);
        }
        if let Some(caps) = RELATIVE_KO.captures(lower) {
            let amount = caps[1].parse::<u32>().ok()?;
            let unit = match &caps[2] {
                "초" => RelativeUnit::Seconds,
                "분" => RelativeUnit::Minutes,
                "시간" => RelativeUnit::Hours,
                "일" => RelativeUnit::Days,
                "주" => RelativeUnit::Weeks,
                "개월" | "달" => RelativeUnit::Months,
                _ => RelativeUnit::Years,
            };
            return self.subtract(amount, unit);
        }
        None
    }

    fn subtract(&self, amount: u32, unit: RelativeUnit) -> Option<NaiveDate> {
        let amount = i64::from(amount);
        let delta = match unit {
            RelativeUnit::Seconds => Duration::try_seconds(amount)?,
            RelativeUnit::Minutes => Duration::try_minutes(amount)?,
            RelativeUnit::Hours => Duration::try_hours(amount)?,
            RelativeUnit::Days => Duration::try_days(amount)?,
            RelativeUnit::Weeks => Duration::try_weeks(amount)?,
            // months are approximated as 30 days
            RelativeUnit::Months => Duration::try_days(amount.checked_mul(30)?)?,
            RelativeUnit::Years => return subtract_years(self.now.date_naive(), amount),
        };
        self.now.checked_sub_signed(delta).map(|t| t.date_naive())
    }

    fn parse_fuzzy(&self, text: &str) -> Option<NaiveDate> {
        if let Some(caps) = FUZZY_YMD.captures(text) {
            if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
                return Some(d);
            }
        }
        if let Some(caps) = FUZZY_MDY_NAMED.captures(text) {
            if let Some(d) = month_number(&caps[1]).and_then(|m| ymd(&caps[3], &m.to_string(), &caps[2])) {
                return Some(d);
            }
        }
        if let Some(caps) = FUZZY_DMY_NAMED.captures(text) {
            if let Some(d) = month_number(&caps[2]).and_then(|m| ymd(&caps[3], &m.to_string(), &caps[1])) {
                return Some(d);
            }
        }
        if let Some(caps) = FUZZY_NUMERIC.captures(text) {
            let first: u32 = caps[1].parse().ok()?;
            // month before day unless the first field cannot be a month
            let parsed = if first > 12 {
                ymd(&caps[3], &caps[2], &caps[1])
            } else {
                ymd(&caps[3], &caps[1], &caps[2])
            };
            if parsed.is_some() {
                return parsed;
            }
        }
        if let Some(caps) = FUZZY_MD_NAMED.captures(text) {
            let month = month_number(&caps[1])?;
            let day: u32 = caps[2].parse().ok()?;
            let today = self.now.date_naive();
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            // a yearless date later than today belongs to last year
            return if this_year > today {
                NaiveDate::from_ymd_opt(today.year() - 1, month, day)
            } else {
                Some(this_year)
            };
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
enum RelativeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// Calendar-year subtraction; Feb 29 clamps to Feb 28 in non-leap years.
fn subtract_years(date: NaiveDate, years: i64) -> Option<NaiveDate> {
    let year = i32::try_from(i64::from(date.year()) - years).ok()?;
    date.with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
}

fn parse_iso(text: &str) -> Option<NaiveDate> {
    let candidate = if ISO_SPACE.is_match(text) {
        text.replacen(' ', "T", 1)
    } else {
        text.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&candidate) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M") {
        return Some(dt.date());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(text, CANONICAL_FORMAT).ok()
}

fn parse_catalog(text: &str) -> Option<NaiveDate> {
    FORMAT_CATALOG
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_CATALOG
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn month_number(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    let month = match lower.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frozen() -> DateNormalizer {
        DateNormalizer::at(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap())
    }

    fn parsed(n: &DateNormalizer, s: &str) -> String {
        n.normalize(s).to_string()
    }

    #[test]
    fn test_now_and_yesterday_phrases() {
        let n = frozen();
        assert_eq!(parsed(&n, "today"), "2024-03-15");
        assert_eq!(parsed(&n, "Just now"), "2024-03-15");
        assert_eq!(parsed(&n, "방금"), "2024-03-15");
        assert_eq!(parsed(&n, "yesterday"), "2024-03-14");
        assert_eq!(parsed(&n, "어제 오후"), "2024-03-14");
        assert_eq!(parsed(&n, "Today, 10:30 AM"), "2024-03-15");
    }

    #[test]
    fn test_phrases_never_override_explicit_dates() {
        let n = frozen();
        assert_eq!(parsed(&n, "Updated 2019-03-01 (today's edition)"), "2019-03-01");
        assert_eq!(parsed(&n, "Yesterday's news from March 2, 2020"), "2020-03-02");
        // no stray matches inside other words
        assert!(n.parse("todayish").is_err());
        assert!(n.parse("yesterdays").is_err());
    }

    #[test]
    fn test_relative_quantities() {
        let n = frozen();
        assert_eq!(parsed(&n, "3 days ago"), "2024-03-12");
        assert_eq!(parsed(&n, "2 hours ago"), "2024-03-15");
        assert_eq!(parsed(&n, "13 hours ago"), "2024-03-14");
        assert_eq!(parsed(&n, "an hour ago"), "2024-03-15");
        assert_eq!(parsed(&n, "2 weeks ago"), "2024-03-01");
        assert_eq!(parsed(&n, "1 month ago"), "2024-02-14");
        assert_eq!(parsed(&n, "5h ago"), "2024-03-15");
        assert_eq!(parsed(&n, "3일 전"), "2024-03-12");
        assert_eq!(parsed(&n, "2시간 전"), "2024-03-15");
    }

    #[test]
    fn test_year_subtraction_clamps_leap_day() {
        let n = DateNormalizer::at(Utc.with_ymd_and_hms(2024, 2, 29, 9, 0, 0).unwrap());
        assert_eq!(parsed(&n, "1 year ago"), "2023-02-28");
        assert_eq!(parsed(&n, "4 years ago"), "2020-02-29");
    }

    #[test]
    fn test_iso_and_rfc_forms() {
        let n = frozen();
        assert_eq!(parsed(&n, "2024-01-01"), "2024-01-01");
        assert_eq!(parsed(&n, "2024-01-01T10:30:00Z"), "2024-01-01");
        assert_eq!(parsed(&n, "2024-01-01 10:30:00"), "2024-01-01");
        assert_eq!(parsed(&n, "2024-01-01T10:30:00.000+0000"), "2024-01-01");
        // 01:00 in Seoul is still the previous day in UTC
        assert_eq!(parsed(&n, "2024-01-01T01:00:00+09:00"), "2023-12-31");
        assert_eq!(parsed(&n, "Mon, 01 Jan 2024 10:00:00 +0000"), "2024-01-01");
    }

    #[test]
    fn test_format_catalog() {
        let n = frozen();
        assert_eq!(parsed(&n, "2024/02/03"), "2024-02-03");
        assert_eq!(parsed(&n, "03/02/2024"), "2024-02-03");
        assert_eq!(parsed(&n, "Feb 3, 2024"), "2024-02-03");
        assert_eq!(parsed(&n, "February 3, 2024"), "2024-02-03");
        assert_eq!(parsed(&n, "3 February 2024"), "2024-02-03");
        assert_eq!(parsed(&n, "2024년 2월 3일"), "2024-02-03");
        assert_eq!(parsed(&n, "2024. 2. 3."), "2024-02-03");
    }

    #[test]
    fn test_fuzzy_fallback() {
        let n = frozen();
        assert_eq!(parsed(&n, "Published on 2024-02-03 by staff"), "2024-02-03");
        assert_eq!(parsed(&n, "Updated: Feb. 3rd, 2024 at noon"), "2024-02-03");
        assert_eq!(parsed(&n, "Posted 3rd February 2024"), "2024-02-03");
        assert_eq!(parsed(&n, "2024년 2월 3일 오후 3:00"), "2024-02-03");
        // yearless dates resolve to the most recent occurrence
        assert_eq!(parsed(&n, "Posted Mar 1"), "2024-03-01");
        assert_eq!(parsed(&n, "Posted Dec 24"), "2023-12-24");
    }

    #[test]
    fn test_unparsed_keeps_original() {
        let n = frozen();
        assert_eq!(n.normalize("sometime soon"), NormalizedDate::Unparsed("sometime soon".to_string()));
        assert_eq!(n.normalize(""), NormalizedDate::Unparsed(String::new()));
        assert!(n.parse("no date here").is_err());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let n = frozen();
        for input in [
            "today",
            "3 days ago",
            "방금",
            "2024-01-01T10:30:00Z",
            "Feb 3, 2024",
            "Posted Dec 24",
            "not a date",
            "",
            "2024-13-45",
        ] {
            let once = n.normalize(input).to_string();
            let twice = n.normalize(&once).to_string();
            assert_eq!(once, twice, "normalizing {input:?} twice changed the result");
        }
    }

    #[test]
    fn test_serde_round_trip_of_sentinel() {
        let date = NormalizedDate::Unparsed("someday".to_string());
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"someday\"");
        let back: NormalizedDate = serde_json::from_str("\"2024-01-01\"").unwrap();
        assert_eq!(back, NormalizedDate::Parsed(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }
}
