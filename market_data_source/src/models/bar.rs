//! Canonical in-memory representation of one instrument's daily bar.
//!
//! This struct is the output of every [`MarketDataSource`](crate::providers::MarketDataSource)
//! implementation, regardless of asset class (index, commodity, bond yield, crypto, FX).
//! Every numeric field is optional: an index-derived file may only carry a close, and
//! an indicator file may carry nothing but the auxiliary value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily bar for a given calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date, exchange-local. No time component.
    pub date: NaiveDate,

    /// Opening price.
    pub open: Option<f64>,

    /// Highest price of the session.
    pub high: Option<f64>,

    /// Lowest price of the session.
    pub low: Option<f64>,

    /// Closing price.
    pub close: Option<f64>,

    /// Volume traded during the session. Indices and FX pairs often report none.
    pub volume: Option<i64>,

    /// Externally computed auxiliary indicator, ingested as opaque data.
    pub indicator: Option<f64>,
}

impl DailyBar {
    /// A bar for `date` with no values set.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            indicator: None,
        }
    }

    /// A fully populated OHLCV bar without indicator.
    pub fn ohlcv(
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        Self {
            date,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            volume: Some(volume),
            indicator: None,
        }
    }

    /// Sets the close price.
    pub fn with_close(mut self, close: f64) -> Self {
        self.close = Some(close);
        self
    }

    /// Sets the auxiliary indicator.
    pub fn with_indicator(mut self, indicator: f64) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Replaces NaN and infinite prices with `None`.
    pub fn sanitized(mut self) -> Self {
        for field in [
            &mut self.open,
            &mut self.high,
            &mut self.low,
            &mut self.close,
            &mut self.indicator,
        ] {
            if field.is_some_and(|v| !v.is_finite()) {
                *field = None;
            }
        }
        self
    }

    /// True when the bar carries no value at all.
    pub fn is_blank(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.volume.is_none()
            && self.indicator.is_none()
    }
}

/// Sorts bars by ascending date and keeps the last bar seen for a repeated date.
pub fn normalize_series(mut bars: Vec<DailyBar>) -> Vec<DailyBar> {
    // stable: later duplicates stay after earlier ones
    bars.sort_by_key(|b| b.date);

    let mut out: Vec<DailyBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, m, day).unwrap()
    }

    #[test]
    fn sanitized_drops_non_finite_values() {
        let mut bar = DailyBar::ohlcv(d(1, 2), 1.0, f64::INFINITY, 0.5, f64::NAN, 10);
        bar.indicator = Some(f64::NEG_INFINITY);

        let bar = bar.sanitized();
        assert_eq!(bar.open, Some(1.0));
        assert_eq!(bar.high, None);
        assert_eq!(bar.low, Some(0.5));
        assert_eq!(bar.close, None);
        assert_eq!(bar.indicator, None);
        assert_eq!(bar.volume, Some(10));
    }

    #[test]
    fn blank_only_when_nothing_is_set() {
        assert!(DailyBar::empty(d(1, 2)).is_blank());
        assert!(!DailyBar::empty(d(1, 2)).with_indicator(0.3).is_blank());

        let nan_only = DailyBar::empty(d(1, 2)).with_close(f64::NAN).sanitized();
        assert!(nan_only.is_blank());
    }

    #[test]
    fn normalize_sorts_and_keeps_last_duplicate() {
        let bars = vec![
            DailyBar::empty(d(1, 4)).with_close(3.0),
            DailyBar::empty(d(1, 2)).with_close(1.0),
            DailyBar::empty(d(1, 4)).with_close(4.0),
            DailyBar::empty(d(1, 3)).with_close(2.0),
        ];

        let got = normalize_series(bars);
        let dates: Vec<_> = got.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![d(1, 2), d(1, 3), d(1, 4)]);
        assert_eq!(got[2].close, Some(4.0));
    }
}
