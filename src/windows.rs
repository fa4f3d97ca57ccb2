//! Calendar windows over logged records.
//!
//! A window is open-ended: it starts at a local midnight and includes
//! everything after it, future-dated records too. All four start points
//! are derived from one snapshot of `now`, each by its own date
//! computation, so no boundary depends on another.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDate, NaiveTime, TimeDelta, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::LoggedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Day,
    Week,
    Month,
    Year,
}

impl TimeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
        }
    }

    /// First calendar date inside the window. Weeks start on Sunday.
    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        match self {
            TimeWindow::Day => today,
            TimeWindow::Week => {
                let since_sunday = u64::from(today.weekday().num_days_from_sunday());
                today.checked_sub_days(Days::new(since_sunday)).unwrap_or(today)
            }
            TimeWindow::Month => {
                NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today)
            }
            TimeWindow::Year => NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(TimeWindow::Day),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            "year" => Ok(TimeWindow::Year),
            other => Err(AppError::InvalidWindow(other.to_string())),
        }
    }
}

/// Window start instants, in epoch millis, for one fixed `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowBounds {
    pub day: i64,
    pub week: i64,
    pub month: i64,
    pub year: i64,
}

impl WindowBounds {
    pub fn at<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let start = |window: TimeWindow| local_midnight(&tz, window.start_date(today));

        Self {
            day: start(TimeWindow::Day),
            week: start(TimeWindow::Week),
            month: start(TimeWindow::Month),
            year: start(TimeWindow::Year),
        }
    }

    pub fn start(&self, window: TimeWindow) -> i64 {
        match window {
            TimeWindow::Day => self.day,
            TimeWindow::Week => self.week,
            TimeWindow::Month => self.month,
            TimeWindow::Year => self.year,
        }
    }
}

/// Epoch millis of the first instant of `date` in `tz`.
///
/// Where a DST jump skips midnight, the day starts an hour later.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        LocalResult::None => tz
            .from_local_datetime(&(midnight + TimeDelta::hours(1)))
            .earliest()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| midnight.and_utc().timestamp_millis()),
    }
}

/// Records that fall inside `window` as seen from `now`, in input order.
///
/// A record without a timestamp is never inside any window.
pub fn filter_by_window<'a, Tz: TimeZone>(
    records: &'a [LoggedRecord],
    window: TimeWindow,
    now: &DateTime<Tz>,
) -> Vec<&'a LoggedRecord> {
    let start = WindowBounds::at(now).start(window);
    let filtered: Vec<&LoggedRecord> = records
        .iter()
        .filter(|record| matches!(record.occurred_at_epoch_millis, Some(ts) if ts >= start))
        .collect();

    tracing::debug!(
        "window {} starts at {}: kept {} of {} records",
        window,
        start,
        filtered.len(),
        records.len()
    );
    filtered
}
