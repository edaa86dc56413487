//! Daily price history for a catalog of instruments, kept in SQLite.
//!
//! - [`catalog`]: which symbols are tracked, loaded from TOML/CSV and synced into `instrument`
//! - [`store`]: the [`TimeSeriesStore`](store::TimeSeriesStore) with replace-range and
//!   merge-upsert writes
//! - [`pipeline`]: resolve → fetch with retry → write → report, per instrument
//! - [`query`]: validated reads for the dashboard
//! - [`config`]: the `ingest` run configuration
//! - [`db`]: connections and embedded migrations

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod store;
