use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    /// `days` on either side of `center`, so `2 * days + 1` days in total.
    pub fn around(center: NaiveDate, days: i64) -> Self {
        let span = Duration::days(days.max(0));
        DateRange {
            start: center.checked_sub_signed(span).unwrap_or(NaiveDate::MIN),
            end: center.checked_add_signed(span).unwrap_or(NaiveDate::MAX),
        }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn date_range_contains() {
        let range = DateRange::new(d(2024, 1, 1), d(2024, 12, 31));
        assert!(range.contains(d(2024, 6, 15)));
        assert!(range.contains(d(2024, 1, 1)));
        assert!(range.contains(d(2024, 12, 31)));
        assert!(!range.contains(d(2023, 12, 31)));
        assert!(!range.contains(d(2025, 1, 1)));
    }

    #[test]
    fn around_is_symmetric_seven_days() {
        let range = DateRange::around(d(2026, 1, 5), 3);
        assert_eq!(range.start, d(2026, 1, 2));
        assert_eq!(range.end, d(2026, 1, 8));
        assert!(!range.contains(d(2026, 1, 1)));
        assert!(!range.contains(d(2026, 1, 9)));
    }

    #[test]
    fn around_crosses_month_boundary() {
        let range = DateRange::around(d(2026, 3, 1), 3);
        assert!(range.contains(d(2026, 2, 26)));
        assert!(!range.contains(d(2026, 2, 25)));
    }

    #[test]
    fn date_range_display() {
        let range = DateRange::new(d(2024, 1, 1), d(2024, 12, 31));
        assert_eq!(range.to_string(), "2024-01-01 to 2024-12-31");
    }
}
