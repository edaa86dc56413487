//! Historical daily market data: the bar model, date windows, and the sources bars are fetched from.
//!
//! - [`models`]: [`DailyBar`](models::bar::DailyBar) and [`DateWindow`](models::window::DateWindow)
//! - [`providers`]: the [`MarketDataSource`](providers::MarketDataSource) trait, its error
//!   taxonomy, and the Yahoo chart and CSV implementations

pub mod models;
pub mod providers;
