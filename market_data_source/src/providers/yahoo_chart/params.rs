use chrono::{Days, NaiveTime};
use serde::Serialize;

use crate::models::window::DateWindow;

/// Query string for a daily chart request.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChartParams {
    /// 00:00:00 UTC of the day before the window start, unix seconds. Exchanges east of
    /// UTC stamp the first day before its UTC midnight; bars are trimmed back to the
    /// window by local date afterwards.
    pub period1: i64,
    /// Window end, 23:59:59 UTC, unix seconds. Makes the end date inclusive.
    pub period2: i64,
    pub interval: &'static str,
    pub include_adjusted_close: bool,
}

impl ChartParams {
    pub fn daily(window: &DateWindow) -> Self {
        let first = window.start();
        let period1 = first
            .checked_sub_days(Days::new(1))
            .unwrap_or(first)
            .and_time(NaiveTime::MIN)
            .and_utc()
            .timestamp();
        let period2 = window
            .end()
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(period1);

        Self {
            period1,
            period2,
            interval: "1d",
            include_adjusted_close: true,
        }
    }
}
