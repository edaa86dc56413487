//! Diesel models mapping to the database schema.
//!
//! These types mirror the tables defined in the embedded migrations and in
//! [`crate::schema`] for use with Diesel’s Queryable/Insertable APIs:
//! - [`crate::schema::instrument`]: tracked symbols and their descriptive metadata
//! - [`crate::schema::daily_bar`]: one price/volume/indicator row per instrument and date
//!
//! See migrations for constraints (`UNIQUE(instrument_id, date)`, `ON DELETE RESTRICT`).

use chrono::NaiveDate;
use diesel::prelude::*;
use market_data_source::models::bar::DailyBar;
use serde::Serialize;

use crate::schema::*;

/// A row in [`crate::schema::instrument`]: one tracked symbol.
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Selectable, Serialize)]
#[diesel(table_name = instrument, check_for_backend(diesel::sqlite::Sqlite))]
pub struct Instrument {
    /// Database primary key. Durable; bars reference it.
    pub id: i32,
    /// Unique ticker as used by the market data source (e.g. "^GSPC", "GC=F").
    pub symbol: String,
    /// Display name (e.g. "Gold Futures").
    pub name: String,
    /// Sector (e.g. "Commodity").
    pub sector: String,
    /// Industry (e.g. "Precious Metals").
    pub industry: String,
}

/// Insertable form of [`Instrument`].
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = instrument)]
pub struct NewInstrument<'a> {
    /// Unique ticker.
    pub symbol: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Sector.
    pub sector: &'a str,
    /// Industry.
    pub industry: &'a str,
}

/// Descriptive fields of [`Instrument`] that catalog sync may rewrite.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = instrument)]
pub struct InstrumentUpdate<'a> {
    /// Display name.
    pub name: &'a str,
    /// Sector.
    pub sector: &'a str,
    /// Industry.
    pub industry: &'a str,
}

/// A row in [`crate::schema::daily_bar`].
#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations, Selectable, Serialize)]
#[diesel(table_name = daily_bar, check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(belongs_to(Instrument, foreign_key = instrument_id))]
pub struct StoredBar {
    /// Database primary key.
    pub id: i32,
    /// FK to [`Instrument::id`].
    pub instrument_id: i32,
    /// Calendar date, stored as `YYYY-MM-DD`.
    pub date: NaiveDate,
    /// Opening price.
    pub open: Option<f64>,
    /// Session high.
    pub high: Option<f64>,
    /// Session low.
    pub low: Option<f64>,
    /// Closing price.
    pub close: Option<f64>,
    /// Traded volume.
    pub volume: Option<i64>,
    /// Auxiliary indicator value.
    pub indicator: Option<f64>,
}

impl StoredBar {
    /// The row as a source-agnostic bar.
    pub fn to_daily_bar(&self) -> DailyBar {
        DailyBar {
            date: self.date,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            indicator: self.indicator,
        }
    }
}

/// Insertable form of [`StoredBar`].
///
/// `None` binds as NULL (not DEFAULT) so rows can be inserted in one batch statement.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = daily_bar, treat_none_as_default_value = false)]
pub struct NewBar {
    /// FK to [`Instrument::id`].
    pub instrument_id: i32,
    /// Calendar date.
    pub date: NaiveDate,
    /// Opening price.
    pub open: Option<f64>,
    /// Session high.
    pub high: Option<f64>,
    /// Session low.
    pub low: Option<f64>,
    /// Closing price.
    pub close: Option<f64>,
    /// Traded volume.
    pub volume: Option<i64>,
    /// Auxiliary indicator value.
    pub indicator: Option<f64>,
}

impl NewBar {
    /// Row for `bar` under `instrument_id`.
    pub fn from_daily(instrument_id: i32, bar: &DailyBar) -> Self {
        Self {
            instrument_id,
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            indicator: bar.indicator,
        }
    }
}

/// Partial update of a [`StoredBar`].
///
/// `None` fields are skipped by Diesel, so a merge only touches the values a fetch supplied.
#[derive(Debug, Clone, Default, PartialEq, AsChangeset)]
#[diesel(table_name = daily_bar)]
pub struct BarChangeset {
    /// New opening price, if supplied.
    pub open: Option<f64>,
    /// New session high, if supplied.
    pub high: Option<f64>,
    /// New session low, if supplied.
    pub low: Option<f64>,
    /// New closing price, if supplied.
    pub close: Option<f64>,
    /// New volume, if supplied.
    pub volume: Option<i64>,
    /// New indicator value, if supplied.
    pub indicator: Option<f64>,
}

impl BarChangeset {
    /// Fields of `incoming` that are set and differ from `existing`.
    pub fn diff(existing: &StoredBar, incoming: &DailyBar) -> Self {
        fn changed<T: PartialEq + Copy>(old: Option<T>, new: Option<T>) -> Option<T> {
            match new {
                Some(v) if old != Some(v) => Some(v),
                _ => None,
            }
        }

        Self {
            open: changed(existing.open, incoming.open),
            high: changed(existing.high, incoming.high),
            low: changed(existing.low, incoming.low),
            close: changed(existing.close, incoming.close),
            volume: changed(existing.volume, incoming.volume),
            indicator: changed(existing.indicator, incoming.indicator),
        }
    }

    /// True when applying the changeset would not modify the row.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
