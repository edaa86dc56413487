//! Store error type shared by the SQLite store, the catalog and the query service.

use chrono::NaiveDate;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use market_data_source::models::window::DateWindow;
use thiserror::Error;

/// Errors raised by [`TimeSeriesStore`](crate::store::TimeSeriesStore) implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested instrument or bar does not exist.
    #[error("record not found")]
    NotFound,

    /// A uniqueness rule was violated while writing. This points at a logic error
    /// (e.g. two writers on one instrument) and is never retried.
    #[error("write conflict on instrument {instrument_id}: {message}")]
    Conflict { instrument_id: i32, message: String },

    /// A replace-range write carried a bar outside the window it replaces.
    #[error("bar dated {date} lies outside the replaced window {window}")]
    OutsideWindow { date: NaiveDate, window: DateWindow },

    /// The database could not be opened.
    #[error("failed to open database {url}: {source}")]
    Connection {
        url: String,
        source: diesel::ConnectionError,
    },

    /// A blocking store task was cancelled or panicked.
    #[error("store task failed: {0}")]
    Task(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(DieselError),
}

impl From<DieselError> for StoreError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

impl StoreError {
    /// Maps a unique-constraint violation on `instrument_id` to [`StoreError::Conflict`].
    pub fn on_write(instrument_id: i32, e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict {
                    instrument_id,
                    message: info.message().to_string(),
                }
            }
            other => other.into(),
        }
    }
}
