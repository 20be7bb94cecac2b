//! Date normalization and time-window relevance.
//!
//! - [`normalize`]: turns arbitrary publish-date text ("3 days ago", "방금",
//!   "Jan 5, 2024", ISO-8601, ...) into a canonical UTC calendar date.
//! - [`relevance`]: decides whether a normalized date falls inside the
//!   requested window, with tiered leniency.

pub mod normalize;
pub mod relevance;

use once_cell::sync::Lazy;
use regex::Regex;

pub use normalize::{DateNormalizer, NormalizedDate};
pub use relevance::{DateRelevanceFilter, RelevancePolicy};

const MONTHS: &str = r"(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?";

/// Date-looking substrings in free text: absolute dates in Latin and Korean
/// conventions plus relative "N units ago" phrases.
static DATE_LIKE: Lazy<Regex> = Lazy::new(|| {
    let pattern = [
        r"\d{4}-\d{1,2}-\d{1,2}(?:[T ]\d{1,2}:\d{2}(?::\d{2})?(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)?".to_string(),
        r"\d{4}[/.]\s?\d{1,2}[/.]\s?\d{1,2}\.?".to_string(),
        r"\d{4}년\s*\d{1,2}월\s*\d{1,2}일".to_string(),
        format!(r"\b{MONTHS}\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}"),
        format!(r"\b\d{{1,2}}(?:st|nd|rd|th)?\s+{MONTHS},?\s+\d{{4}}"),
        r"\b\d{1,2}/\d{1,2}/\d{4}\b".to_string(),
        r"\b\d+\s*(?:seconds?|minutes?|mins?|hours?|hrs?|days?|weeks?|months?|years?)\s+ago\b".to_string(),
        r"\d+\s*(?:초|분|시간|일|주|개월|달|년)\s*전".to_string(),
        r"\b(?:yesterday|today|just now)\b".to_string(),
        r"방금|어제|오늘".to_string(),
    ]
    .join("|");
    Regex::new(&format!("(?i){pattern}")).expect("DATE_LIKE should compile")
});

/// Iterate over every date-looking substring of `text`, in document order.
pub fn find_date_like(text: &str) -> impl Iterator<Item = &str> {
    DATE_LIKE.find_iter(text).map(|m| m.as_str())
}

/// The first date-looking substring of `text`, if any.
pub fn first_date_like(text: &str) -> Option<&str> {
    find_date_like(text).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_date_like_in_document_order() {
        let text = "Posted 2024-01-05 by admin. Updated 3 hours ago. Older: March 2, 2023";
        let found: Vec<&str> = find_date_like(text).collect();
        assert_eq!(found, vec!["2024-01-05", "3 hours ago", "March 2, 2023"]);
    }

    #[test]
    fn test_find_korean_dates() {
        let text = "작성일 2024년 3월 5일 · 댓글 2시간 전";
        let found: Vec<&str> = find_date_like(text).collect();
        assert_eq!(found, vec!["2024년 3월 5일", "2시간 전"]);
    }

    #[test]
    fn test_plain_prose_has_no_dates() {
        assert_eq!(first_date_like("A story about rust and crabs"), None);
    }
}
