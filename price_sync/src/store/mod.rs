//! Durable time-series storage keyed by (instrument, date).
//!
//! [`TimeSeriesStore`] is the only write path for bars. It offers two explicit strategies:
//!
//! - [`WriteMode::ReplaceRange`]: delete every bar of the instrument inside the covered
//!   window, then insert the fetched set. Destructive inside the window, untouched outside.
//! - [`WriteMode::MergeUpsert`]: per date, update only the fields the fetch supplied and
//!   insert rows that don't exist yet. Re-running with the same input changes nothing.
//!
//! Both strategies run in one `BEGIN IMMEDIATE` transaction and are serialized per
//! instrument. Reads never take application locks.

mod locks;
mod sqlite;

use chrono::NaiveDate;
use market_data_source::models::{bar::DailyBar, window::DateWindow};
use serde::{Deserialize, Serialize};

use crate::catalog::InstrumentSpec;
use crate::error::StoreError;
use crate::models::{Instrument, StoredBar};

pub use locks::InstrumentLocks;
pub use sqlite::SqliteStore;

/// How fetched bars are reconciled with stored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Delete the covered window, then insert.
    #[default]
    ReplaceRange,
    /// Field-wise update of existing dates, insert of new ones.
    MergeUpsert,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WriteMode::ReplaceRange => "replace-range",
            WriteMode::MergeUpsert => "merge-upsert",
        })
    }
}

/// Row counts of one write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Merge only: rows whose stored values already matched.
    pub unchanged: usize,
    /// Replace only: rows removed from the window before inserting.
    pub deleted: usize,
}

impl WriteSummary {
    /// Rows inserted or modified.
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Bounds for [`TimeSeriesStore::range`]. Absent bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: i64,
}

impl RangeQuery {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>, limit: i64) -> Self {
        Self { start, end, limit }
    }
}

/// Storage for instruments and their daily bars.
///
/// Methods are blocking; async callers run them on a blocking thread.
pub trait TimeSeriesStore: Send + Sync {
    /// Looks the symbol up, creating the instrument from `spec` when missing.
    /// Descriptive fields of an existing instrument are left as they are.
    fn resolve_instrument(&self, spec: &InstrumentSpec) -> Result<Instrument, StoreError>;

    fn instrument(&self, id: i32) -> Result<Instrument, StoreError>;

    fn instrument_by_symbol(&self, symbol: &str) -> Result<Instrument, StoreError>;

    /// Instruments ordered by id.
    fn list_instruments(&self, offset: i64, limit: i64) -> Result<Vec<Instrument>, StoreError>;

    /// Replaces every bar of the instrument inside `window` with `bars`.
    ///
    /// Fails with [`StoreError::OutsideWindow`] before touching anything when a bar is
    /// dated outside `window`.
    fn replace_range(
        &self,
        instrument_id: i32,
        window: &DateWindow,
        bars: &[DailyBar],
    ) -> Result<WriteSummary, StoreError>;

    /// Merges `bars` into the stored rows field by field.
    fn merge_upsert(&self, instrument_id: i32, bars: &[DailyBar])
    -> Result<WriteSummary, StoreError>;

    /// Dispatches to the strategy selected by `mode`.
    fn write(
        &self,
        instrument_id: i32,
        mode: WriteMode,
        window: &DateWindow,
        bars: &[DailyBar],
    ) -> Result<WriteSummary, StoreError> {
        match mode {
            WriteMode::ReplaceRange => self.replace_range(instrument_id, window, bars),
            WriteMode::MergeUpsert => self.merge_upsert(instrument_id, bars),
        }
    }

    /// Bars with `start <= date <= end`, newest first, at most `limit`.
    fn range(&self, instrument_id: i32, query: &RangeQuery) -> Result<Vec<StoredBar>, StoreError>;

    /// Most recent bar, or [`StoreError::NotFound`].
    fn latest(&self, instrument_id: i32) -> Result<StoredBar, StoreError>;
}
