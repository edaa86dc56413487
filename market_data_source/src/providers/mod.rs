//! Provider abstraction for market data sources.
//!
//! This module defines the [`MarketDataSource`] trait, the single seam through which the
//! ingestion pipeline obtains historical daily bars. Concrete sources live in submodules:
//! - [`yahoo_chart`]: the public chart REST endpoint (prices for indices, futures, crypto, FX)
//! - [`csv_file`]: local CSV files, typically an externally computed indicator series
//!
//! The trait is async and object safe so that sources can be selected at runtime and
//! shared as `Arc<dyn MarketDataSource>`.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_source::models::{bar::DailyBar, window::DateWindow};
//! use market_data_source::providers::{MarketDataSource, SourceError};
//!
//! struct Fixed;
//!
//! #[async_trait]
//! impl MarketDataSource for Fixed {
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//!
//!     async fn fetch(&self, symbol: &str, _window: DateWindow) -> Result<Vec<DailyBar>, SourceError> {
//!         Err(SourceError::empty(symbol))
//!     }
//! }
//! ```

pub mod csv_file;
pub mod errors;
pub mod yahoo_chart;

use async_trait::async_trait;
use snafu::{Backtrace, Snafu};

use crate::models::{bar::DailyBar, window::DateWindow};

pub use errors::{SourceError, SourceErrorKind};

/// Fetches historical daily bars for one symbol over one inclusive date window.
///
/// Implementations must return bars in ascending date order with at most one bar per
/// date, all inside the window. Gaps for non-trading days are expected. An answer with
/// no bars is reported as [`SourceError::EmptyResult`], never as an empty `Ok`.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Fetches the bars for `symbol` with `window.start() <= date <= window.end()`.
    async fn fetch(&self, symbol: &str, window: DateWindow) -> Result<Vec<DailyBar>, SourceError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// base URL can't carry a symbol path segment
    #[snafu(display("Invalid base URL {url}: {message}"))]
    InvalidBaseUrl {
        url: String,
        message: String,
        backtrace: Backtrace,
    },
}
