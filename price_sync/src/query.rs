//! Read side: instruments, bar ranges and latest values for the dashboard.
//!
//! [`QueryService`] validates request parameters and maps store errors to
//! [`QueryError`], whose `NotFound` and `InvalidArgument` variants are client outcomes.

use std::sync::Arc;

use chrono::NaiveDate;
use market_data_source::models::window::DateWindow;
use thiserror::Error;

use crate::error::StoreError;
use crate::models::{Instrument, StoredBar};
use crate::store::{RangeQuery, TimeSeriesStore};

/// Page size when the caller gives none.
pub const DEFAULT_LIMIT: i64 = 100;
/// Largest page a caller may ask for.
pub const MAX_LIMIT: i64 = 1000;
/// Longest trailing series, in days.
pub const MAX_TRAILING_DAYS: u32 = 3650;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("not found")]
    NotFound,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Internal(StoreError),
}

impl QueryError {
    /// True for outcomes caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::NotFound | QueryError::InvalidArgument(_))
    }
}

impl From<StoreError> for QueryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => QueryError::NotFound,
            other => QueryError::Internal(other),
        }
    }
}

/// Parameters of a bar range request. Absent bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarsQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub limit: Option<i64>,
}

impl BarsQuery {
    fn validate(&self) -> Result<RangeQuery, QueryError> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(QueryError::InvalidArgument(format!(
                    "start {start} is after end {end}"
                )));
            }
        }
        let limit = checked_limit(self.limit)?;
        Ok(RangeQuery::new(self.start, self.end, limit))
    }
}

fn checked_limit(limit: Option<i64>) -> Result<i64, QueryError> {
    match limit.unwrap_or(DEFAULT_LIMIT) {
        n @ 1..=MAX_LIMIT => Ok(n),
        n => Err(QueryError::InvalidArgument(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {n}"
        ))),
    }
}

/// Blocking read API over a shared store handle.
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn TimeSeriesStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { store }
    }

    /// Instruments ordered by id.
    pub fn list_instruments(
        &self,
        offset: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Instrument>, QueryError> {
        if offset < 0 {
            return Err(QueryError::InvalidArgument(format!(
                "offset must not be negative, got {offset}"
            )));
        }
        let limit = checked_limit(limit)?;
        Ok(self.store.list_instruments(offset, limit)?)
    }

    pub fn instrument(&self, id: i32) -> Result<Instrument, QueryError> {
        Ok(self.store.instrument(id)?)
    }

    pub fn instrument_by_symbol(&self, symbol: &str) -> Result<Instrument, QueryError> {
        Ok(self.store.instrument_by_symbol(symbol)?)
    }

    /// Bars of one instrument, newest first.
    ///
    /// An unknown instrument is `NotFound`; a known one without bars in range yields
    /// an empty list.
    pub fn bars(&self, instrument_id: i32, query: BarsQuery) -> Result<Vec<StoredBar>, QueryError> {
        let range = query.validate()?;
        self.store.instrument(instrument_id)?;
        Ok(self.store.range(instrument_id, &range)?)
    }

    pub fn bars_by_symbol(
        &self,
        symbol: &str,
        query: BarsQuery,
    ) -> Result<Vec<StoredBar>, QueryError> {
        let range = query.validate()?;
        let instrument = self.store.instrument_by_symbol(symbol)?;
        Ok(self.store.range(instrument.id, &range)?)
    }

    pub fn latest(&self, instrument_id: i32) -> Result<StoredBar, QueryError> {
        Ok(self.store.latest(instrument_id)?)
    }

    /// The last `days` days of `symbol` ending at `today`, newest first.
    pub fn trailing(
        &self,
        symbol: &str,
        days: u32,
        today: NaiveDate,
    ) -> Result<Vec<StoredBar>, QueryError> {
        if !(1..=MAX_TRAILING_DAYS).contains(&days) {
            return Err(QueryError::InvalidArgument(format!(
                "days must be between 1 and {MAX_TRAILING_DAYS}, got {days}"
            )));
        }
        let window = DateWindow::trailing_days(today, u64::from(days))
            .map_err(|e| QueryError::InvalidArgument(e.to_string()))?;
        let instrument = self.store.instrument_by_symbol(symbol)?;
        let range = RangeQuery::new(Some(window.start()), Some(window.end()), i64::from(days));
        Ok(self.store.range(instrument.id, &range)?)
    }
}
