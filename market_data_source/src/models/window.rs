//! Inclusive calendar-date windows used for fetch requests and range writes.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use thiserror::Error;

/// Errors raised when building a [`DateWindow`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateWindowError {
    #[error("window start {start} is after end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },

    #[error("window of {days} days before {end} underflows the calendar")]
    OutOfRange { end: NaiveDate, days: u64 },
}

/// An inclusive `[start, end]` range of calendar dates. Always `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateWindowError> {
        if start > end {
            return Err(DateWindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// `[end - days, end]`.
    pub fn trailing_days(end: NaiveDate, days: u64) -> Result<Self, DateWindowError> {
        let start = end
            .checked_sub_days(Days::new(days))
            .ok_or(DateWindowError::OutOfRange { end, days })?;
        Ok(Self { start, end })
    }

    /// `[end - 365 * years days, end]`, the way lookback periods are counted for refreshes.
    pub fn trailing_years(end: NaiveDate, years: u32) -> Result<Self, DateWindowError> {
        Self::trailing_days(end, 365 * u64::from(years))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
