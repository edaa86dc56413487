//! Small helpers shared by the workspace crates: environment lookups and TOML file loading.

pub mod config;
pub mod env;
