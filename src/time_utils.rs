// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and the session clock.

use chrono::{DateTime, Days, Local, NaiveDate, SecondsFormat, Utc};
use std::sync::Mutex;

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format a calendar date the way it is keyed in storage (`YYYY-MM-DD`).
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `count` consecutive calendar dates starting at (and including) `start`.
pub fn upcoming_dates(start: NaiveDate, count: u64) -> Vec<NaiveDate> {
    (0..count)
        .filter_map(|offset| start.checked_add_days(Days::new(offset)))
        .collect()
}

/// Source of "now" and "today" for the workflows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The user's current calendar date.
    fn today(&self) -> NaiveDate;
}

/// Wall clock; "today" follows the device's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a settable instant, for tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Midday UTC on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upcoming_dates_include_start_and_cross_month() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 29).unwrap();
        let dates = upcoming_dates(start, 7);
        assert_eq!(dates.len(), 7);
        assert_eq!(dates[0], start);
        assert_eq!(dates[6], NaiveDate::from_ymd_opt(2026, 2, 4).unwrap());
    }

    #[test]
    fn rfc3339_has_z_suffix() {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
            .and_utc();
        assert_eq!(format_utc_rfc3339(ts), "2026-03-01T08:30:00.000Z");
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2026, 5, 10).unwrap());
        clock.advance(chrono::Duration::hours(13));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 5, 11).unwrap());
    }
}
