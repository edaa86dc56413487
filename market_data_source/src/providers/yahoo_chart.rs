//! Yahoo Finance v8 chart endpoint.
//!
//! One GET per symbol and window, daily interval, no authentication. The endpoint has no
//! official contract, so every shape assumption is checked and reported as
//! [`SourceError::Malformed`](super::SourceError::Malformed) rather than panicking.

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{YahooChartConfig, YahooChartProvider};
