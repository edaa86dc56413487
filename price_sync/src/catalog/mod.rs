//! Catalog subsystem.
//!
//! This module groups configuration and normalization utilities for the symbol
//! catalog, which lists the tracked instruments and their display metadata.
//! See [`crate::catalog::config`] for the TOML/CSV model and helpers and
//! [`crate::catalog::sync`] for writing it into the `instrument` table.

pub mod config;
pub mod repo;
pub mod sync;

pub use config::{Catalog, InstrumentCfg, InstrumentSpec};
