//! Run configuration for `price-sync ingest`.
//!
//! ```toml
//! database_url = "data/prices.sqlite"
//! catalog = "config/catalog.toml"
//!
//! [window]
//! years = 10
//!
//! [retry]
//! max_attempts = 3
//! delay_secs = 5
//! backoff = "fixed"
//!
//! [ingest]
//! mode = "merge_upsert"
//! concurrency = 4
//! fetch_timeout_secs = 60
//!
//! [yahoo]
//! timeout_secs = 30
//! ```
//!
//! Every section is optional. `DATABASE_URL` in the environment wins over `database_url`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use chrono::NaiveDate;
use market_data_source::{models::window::DateWindow, providers::yahoo_chart::YahooChartConfig};
use serde::Deserialize;
use shared_utils::{config::read_toml_file, env::optional_env_var};

use crate::pipeline::{Backoff, IngestOptions, RetryPolicy};
use crate::store::WriteMode;

/// Environment variable overriding [`SyncConfig::database_url`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const DEFAULT_DATABASE_URL: &str = "prices.sqlite";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Catalog file (TOML, or CSV when the extension is `.csv`). Built-in list when absent.
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub retry: RetryCfg,
    #[serde(default)]
    pub ingest: IngestCfg,
    #[serde(default)]
    pub yahoo: YahooCfg,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            catalog: None,
            window: WindowCfg::default(),
            retry: RetryCfg::default(),
            ingest: IngestCfg::default(),
            yahoo: YahooCfg::default(),
        }
    }
}

/// Lookback window. `end` defaults to today.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WindowCfg {
    pub years: u32,
    pub end: Option<NaiveDate>,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            years: 10,
            end: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    None,
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryCfg {
    pub max_attempts: u32,
    pub delay_secs: u64,
    pub backoff: BackoffKind,
    /// Cap for exponential backoff.
    pub max_delay_secs: u64,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_secs: 5,
            backoff: BackoffKind::Fixed,
            max_delay_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct IngestCfg {
    pub mode: WriteMode,
    pub concurrency: usize,
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for IngestCfg {
    fn default() -> Self {
        Self {
            mode: WriteMode::ReplaceRange,
            concurrency: 4,
            fetch_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct YahooCfg {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}

impl SyncConfig {
    /// Reads `path`, then applies the environment override.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let cfg: SyncConfig = read_toml_file(path)
            .with_context(|| format!("loading sync config {}", path.display()))?;
        Ok(cfg.with_env_overrides())
    }

    /// Defaults plus the environment override, for runs without a config file.
    pub fn from_env() -> Self {
        SyncConfig::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(url) = optional_env_var(DATABASE_URL_ENV) {
            self.database_url = url;
        }
        self
    }

    pub fn to_window(&self, today: NaiveDate) -> anyhow::Result<DateWindow> {
        let end = self.window.end.unwrap_or(today);
        DateWindow::trailing_years(end, self.window.years)
            .with_context(|| format!("building a {}-year window", self.window.years))
    }

    pub fn to_retry_policy(&self) -> RetryPolicy {
        let r = &self.retry;
        let delay = Duration::from_secs(r.delay_secs);
        let backoff = match r.backoff {
            BackoffKind::None => Backoff::None,
            BackoffKind::Fixed => Backoff::Fixed(delay),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: delay,
                cap: Duration::from_secs(r.max_delay_secs.max(r.delay_secs)),
            },
        };
        RetryPolicy {
            max_attempts: r.max_attempts,
            backoff,
        }
    }

    pub fn to_ingest_options(&self, today: NaiveDate) -> anyhow::Result<IngestOptions> {
        Ok(IngestOptions {
            window: self.to_window(today)?,
            mode: self.ingest.mode,
            retry: self.to_retry_policy(),
            concurrency: self.ingest.concurrency.max(1),
            fetch_timeout: self.ingest.fetch_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn to_yahoo_config(&self) -> YahooChartConfig {
        let mut cfg = YahooChartConfig::default();
        if let Some(url) = &self.yahoo.base_url {
            cfg.base_url = url.clone();
        }
        if let Some(secs) = self.yahoo.timeout_secs {
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(ua) = &self.yahoo.user_agent {
            cfg.user_agent = ua.clone();
        }
        cfg
    }
}
