use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{FetchError, Result};

const LAST_SECOND_OF_DAY: i64 = 86_399;

/// Inclusive calendar date range, interpreted as
/// `[start 00:00:00, end 23:59:59]` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(FetchError::Range { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range covering the last `days_back` days up to and including `today`.
    pub fn last_days(today: NaiveDate, days_back: u32) -> Result<Self> {
        let start = today
            .checked_sub_days(Days::new(u64::from(days_back)))
            .ok_or(FetchError::RangeOverflow {
                end: today,
                days: days_back,
            })?;
        Ok(Self { start, end: today })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn start_instant(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::default()))
    }

    pub fn end_instant(&self) -> DateTime<Utc> {
        let midnight = self.end.and_time(NaiveTime::default());
        Utc.from_utc_datetime(&(midnight + Duration::seconds(LAST_SECOND_OF_DAY)))
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start_instant() && *at <= self.end_instant()
    }

    /// Number of calendar days in the range, both ends included.
    pub fn days(&self) -> u64 {
        (self.end - self.start).num_days() as u64 + 1
    }

    /// IMAP `SEARCH` criterion for the range.
    ///
    /// IMAP dates carry no time zone, so the window is widened by a day on
    /// each side and the parsed `Date` header decides admission.
    pub fn imap_criterion(&self) -> String {
        let since = self.start - Duration::days(1);
        let before = self.end + Duration::days(2);
        format!(
            "SINCE {} BEFORE {}",
            since.format("%d-%b-%Y"),
            before.format("%d-%b-%Y")
        )
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} .. {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::new(day(2024, 1, 3), day(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, FetchError::Range { .. }));
    }

    #[test]
    fn single_day_covers_whole_day() {
        let range = DateRange::new(day(2024, 1, 1), day(2024, 1, 1)).unwrap();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 1, 1, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        assert!(range.contains(&first));
        assert!(range.contains(&last));
        assert!(!range.contains(&next));
        assert_eq!(range.days(), 1);
    }

    #[test]
    fn imap_criterion_is_widened() {
        let range = DateRange::new(day(2024, 3, 1), day(2024, 3, 31)).unwrap();
        assert_eq!(range.imap_criterion(), "SINCE 29-Feb-2024 BEFORE 02-Apr-2024");
    }

    #[test]
    fn last_days_ends_today() {
        let range = DateRange::last_days(day(2024, 5, 10), 7).unwrap();
        assert_eq!(range.start(), day(2024, 5, 3));
        assert_eq!(range.end(), day(2024, 5, 10));

        let today = DateRange::last_days(day(2024, 5, 10), 0).unwrap();
        assert_eq!(today.days(), 1);
    }

    #[test]
    fn last_days_past_the_calendar_is_an_error() {
        let err = DateRange::last_days(day(2024, 5, 10), u32::MAX).unwrap_err();
        assert!(matches!(err, FetchError::RangeOverflow { days: u32::MAX, .. }));
    }
}
