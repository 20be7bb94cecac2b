//! Time-window filtering with tiered leniency.
//!
//! Date metadata on arbitrary sites is unreliable, so the filter leans toward
//! keeping stories:
//!
//! - no date, or an unparsed date: keep
//! - a `target_date` floor: drop only dates strictly before it
//! - otherwise keep dates inside `now - timeframe - grace`
//! - failing that, keep dates within the backup window (7 days by default)

use crate::dates::NormalizedDate;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TIMEFRAME_HOURS: u32 = 48;
pub const DEFAULT_GRACE_HOURS: u32 = 24;
pub const DEFAULT_BACKUP_DAYS: u32 = 7;

/// How lenient relevance filtering is for one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevancePolicy {
    /// Primary window, in hours before now.
    pub timeframe_hours: u32,
    /// Extra slack for dates that only carry day granularity.
    pub grace_hours: u32,
    /// Backup admission window in days; `None` disables it.
    pub backup_days: Option<u32>,
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self {
            timeframe_hours: DEFAULT_TIMEFRAME_HOURS,
            grace_hours: DEFAULT_GRACE_HOURS,
            backup_days: Some(DEFAULT_BACKUP_DAYS),
        }
    }
}

impl RelevancePolicy {
    pub fn with_timeframe_hours(timeframe_hours: u32) -> Self {
        Self { timeframe_hours, ..Self::default() }
    }

    pub fn backup_days(mut self, backup_days: Option<u32>) -> Self {
        self.backup_days = backup_days;
        self
    }
}

/// Decides whether a story's date falls inside the relevance window.
#[derive(Debug, Clone, Copy)]
pub struct DateRelevanceFilter {
    now: DateTime<Utc>,
    target_date: Option<NaiveDate>,
    policy: RelevancePolicy,
}

impl DateRelevanceFilter {
    pub fn new(now: DateTime<Utc>, target_date: Option<NaiveDate>, policy: RelevancePolicy) -> Self {
        Self { now, target_date, policy }
    }

    pub fn policy(&self) -> RelevancePolicy {
        self.policy
    }

    /// `true` when a story dated `date` should be kept.
    pub fn is_relevant(&self, date: Option<&NormalizedDate>) -> bool {
        let Some(date) = date else {
            return true;
        };
        let Some(day) = date.date() else {
            debug!(raw = %date, "Keeping story with unparsed date");
            return true;
        };

        if let Some(target) = self.target_date {
            return day >= target;
        }

        let day_start = day.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
        let window = Duration::hours(i64::from(self.policy.timeframe_hours))
            + Duration::hours(i64::from(self.policy.grace_hours));
        if let (Some(start), Some(cutoff)) = (day_start, self.now.checked_sub_signed(window)) {
            if start >= cutoff {
                return true;
            }
        }

        match self.policy.backup_days {
            Some(days) => {
                let age = (self.now.date_naive() - day).num_days();
                let admitted = age <= i64::from(days);
                if admitted {
                    debug!(%day, age_days = age, "Admitted by backup window");
                }
                admitted
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NormalizedDate {
        NormalizedDate::Parsed(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_missing_date_is_always_relevant() {
        for hours in [0, 1, 48, 10_000] {
            let filter = DateRelevanceFilter::new(now(), None, RelevancePolicy::with_timeframe_hours(hours));
            assert!(filter.is_relevant(None));
        }
        let floored = DateRelevanceFilter::new(now(), NaiveDate::from_ymd_opt(2030, 1, 1), RelevancePolicy::default());
        assert!(floored.is_relevant(None));
    }

    #[test]
    fn test_unparsed_date_is_relevant() {
        let filter = DateRelevanceFilter::new(now(), None, RelevancePolicy::default().backup_days(None));
        assert!(filter.is_relevant(Some(&NormalizedDate::Unparsed("sometime".to_string()))));
    }

    #[test]
    fn test_target_date_floor() {
        let target = NaiveDate::from_ymd_opt(2024, 3, 10);
        let filter = DateRelevanceFilter::new(now(), target, RelevancePolicy::default());
        assert!(!filter.is_relevant(Some(&day(2024, 3, 9))));
        assert!(filter.is_relevant(Some(&day(2024, 3, 10))));
        assert!(filter.is_relevant(Some(&day(2024, 3, 14))));
        // the floor applies regardless of the backup window
        let old_target = NaiveDate::from_ymd_opt(2024, 3, 14);
        let filter = DateRelevanceFilter::new(now(), old_target, RelevancePolicy::default());
        assert!(!filter.is_relevant(Some(&day(2024, 3, 13))));
    }

    #[test]
    fn test_window_with_grace() {
        let policy = RelevancePolicy::with_timeframe_hours(24).backup_days(None);
        let filter = DateRelevanceFilter::new(now(), None, policy);
        // cutoff = 2024-03-13T12:00; 03-14 starts after it
        assert!(filter.is_relevant(Some(&day(2024, 3, 14))));
        assert!(filter.is_relevant(Some(&day(2024, 3, 15))));
        assert!(!filter.is_relevant(Some(&day(2024, 3, 13))));
    }

    #[test]
    fn test_backup_window_admits_week_old_dates() {
        let policy = RelevancePolicy::with_timeframe_hours(24);
        let filter = DateRelevanceFilter::new(now(), None, policy);
        assert!(filter.is_relevant(Some(&day(2024, 3, 8))));
        assert!(!filter.is_relevant(Some(&day(2024, 3, 7))));

        let lenient = DateRelevanceFilter::new(now(), None, policy.backup_days(Some(30)));
        assert!(lenient.is_relevant(Some(&day(2024, 2, 20))));
    }

    #[test]
    fn test_future_dates_are_kept() {
        let filter = DateRelevanceFilter::new(now(), None, RelevancePolicy::default().backup_days(None));
        assert!(filter.is_relevant(Some(&day(2024, 3, 20))));
    }
}
