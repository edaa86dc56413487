//! Catalog configuration: parsing, normalization, and loading.
//!
//! The symbol catalog lists the instruments this deployment tracks, with the descriptive
//! metadata shown on the dashboard:
//!
//! ```toml
//! [instruments."GC=F"]
//! name = "Gold Futures"
//! sector = "Commodity"
//! industry = "Precious Metals"
//! ```
//!
//! Key behaviors:
//! - Normalization trims every field and rejects empty symbols or names.
//! - Symbols keep their case: `^GSPC` and `^gspc` are different instruments.
//! - When two entries collide after trimming, the first one wins.
//!
//! Entrypoints:
//! - Built-in default list: [`builtin_catalog`]
//! - Parse + normalize from a TOML string: [`load_catalog_str`]
//! - Parse + normalize from a file path: [`load_catalog_path`]
//! - Index constituent listings in CSV: [`load_catalog_csv`] / [`load_catalog_csv_path`]

use std::{io::Read, path::Path};

use anyhow::{Context, bail};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use toml::from_str;
use tracing::debug;

/// Top-level catalog mapping symbols to their metadata.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    /// Map of symbol -> metadata, in file order.
    #[serde(default)]
    pub instruments: IndexMap<String, InstrumentCfg>,
}

/// Descriptive metadata for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentCfg {
    /// Display name (e.g. "S&P 500 Index").
    pub name: String,
    /// Sector (e.g. "Index"). May be empty.
    #[serde(default)]
    pub sector: String,
    /// Industry (e.g. "Market Index"). May be empty.
    #[serde(default)]
    pub industry: String,
}

/// One instrument as handed to the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstrumentSpec {
    /// Unique ticker.
    pub symbol: String,
    /// Display name.
    pub name: String,
    /// Sector.
    pub sector: String,
    /// Industry.
    pub industry: String,
}

impl InstrumentSpec {
    /// Spec for a symbol nobody described; the symbol doubles as the name.
    pub fn bare(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            sector: String::new(),
            industry: String::new(),
        }
    }
}

impl Catalog {
    /// All entries as pipeline specs, in catalog order.
    pub fn specs(&self) -> Vec<InstrumentSpec> {
        self.instruments
            .iter()
            .map(|(symbol, cfg)| InstrumentSpec {
                symbol: symbol.clone(),
                name: cfg.name.clone(),
                sector: cfg.sector.clone(),
                industry: cfg.industry.clone(),
            })
            .collect()
    }

    /// Specs for `symbols`, in first-seen order with repeats dropped. Unknown symbols get
    /// a bare spec.
    pub fn select(&self, symbols: &[String]) -> Vec<InstrumentSpec> {
        symbols
            .iter()
            .map(|s| s.trim())
            .collect::<IndexSet<_>>()
            .into_iter()
            .map(|s| match self.instruments.get(s) {
                Some(cfg) => InstrumentSpec {
                    symbol: s.to_string(),
                    name: cfg.name.clone(),
                    sector: cfg.sector.clone(),
                    industry: cfg.industry.clone(),
                },
                None => InstrumentSpec::bare(s),
            })
            .collect()
    }
}

/// Summary of changes performed during normalization.
///
/// All counters are additive for the processed catalog.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Number of symbols that changed when trimming.
    pub symbols_trimmed: usize,
    /// Number of name/sector/industry values that changed when trimming.
    pub fields_trimmed: usize,
    /// Entries dropped because their symbol collided with an earlier one.
    pub duplicates_dropped: usize,
}

/// Normalize a catalog in-place.
///
/// - Trim symbols and descriptive fields
/// - Reject empty symbols and empty names
/// - Keep the first entry when trimmed symbols collide
pub fn normalize_catalog(cat: &mut Catalog) -> anyhow::Result<NormalizationReport> {
    let mut report = NormalizationReport::default();
    let mut rebuilt: IndexMap<String, InstrumentCfg> = IndexMap::new();

    for (raw_symbol, cfg) in std::mem::take(&mut cat.instruments) {
        let symbol = raw_symbol.trim().to_string();
        if symbol.is_empty() {
            bail!("instrument symbol cannot be empty after trimming");
        }
        if symbol != raw_symbol {
            report.symbols_trimmed += 1;
        }

        let mut trim = |v: String| {
            let t = v.trim();
            if t.len() != v.len() {
                report.fields_trimmed += 1;
                t.to_string()
            } else {
                v
            }
        };
        let cfg = InstrumentCfg {
            name: trim(cfg.name),
            sector: trim(cfg.sector),
            industry: trim(cfg.industry),
        };
        if cfg.name.is_empty() {
            bail!("instrument {symbol} has an empty name");
        }

        if rebuilt.contains_key(&symbol) {
            report.duplicates_dropped += 1;
            continue;
        }
        rebuilt.insert(symbol, cfg);
    }

    cat.instruments = rebuilt;
    Ok(report)
}

/// The instruments the dashboard has always tracked.
pub fn builtin_catalog() -> Catalog {
    let entries = [
        ("^GSPC", "S&P 500 Index", "Index", "Market Index"),
        ("GC=F", "Gold Futures", "Commodity", "Precious Metals"),
        ("^TNX", "10-Year Treasury Yield", "Fixed Income", "Government Bonds"),
        ("BTC-USD", "Bitcoin USD", "Cryptocurrency", "Digital Assets"),
        ("EURUSD=X", "EUR/USD Exchange Rate", "Forex", "Currency Pairs"),
    ];

    Catalog {
        instruments: entries
            .into_iter()
            .map(|(symbol, name, sector, industry)| {
                (
                    symbol.to_string(),
                    InstrumentCfg {
                        name: name.into(),
                        sector: sector.into(),
                        industry: industry.into(),
                    },
                )
            })
            .collect(),
    }
}

/// Parse and normalize a catalog from a TOML string.
///
/// Errors:
/// - TOML parse failures
/// - Normalization errors (see [`normalize_catalog`])
pub fn load_catalog_str(toml_str: &str) -> anyhow::Result<Catalog> {
    let mut cat: Catalog = from_str(toml_str).context("failed to parse catalog TOML")?;
    let report = normalize_catalog(&mut cat).context("normalize_catalog failed")?;
    debug!(?report, "catalog normalized");
    Ok(cat)
}

/// Read a catalog TOML file from disk, parse, and normalize it.
///
/// See [`load_catalog_str`] for details on parsing and normalization.
pub fn load_catalog_path(path: impl AsRef<Path>) -> anyhow::Result<Catalog> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read catalog file {}", path.as_ref().display()))?;
    load_catalog_str(&text)
}

/// One row of an index constituents listing.
///
/// Accepts plain `symbol,name,sector,industry` headers as well as the
/// `Symbol,Security,GICS Sector,GICS Sub-Industry` layout of published S&P 500 tables.
#[derive(Debug, Deserialize)]
struct ListingRow {
    #[serde(alias = "Symbol")]
    symbol: String,
    #[serde(alias = "Security", alias = "Name")]
    name: String,
    #[serde(default, alias = "GICS Sector", alias = "Sector")]
    sector: String,
    #[serde(default, alias = "GICS Sub-Industry", alias = "Industry")]
    industry: String,
}

/// Parse and normalize a catalog from CSV.
pub fn load_catalog_csv(reader: impl Read) -> anyhow::Result<Catalog> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut cat = Catalog::default();
    let mut dropped = 0usize;
    for (i, row) in rdr.deserialize::<ListingRow>().enumerate() {
        let row = row.with_context(|| format!("catalog CSV row {}", i + 2))?;
        if cat.instruments.contains_key(&row.symbol) {
            dropped += 1;
            continue;
        }
        cat.instruments.insert(
            row.symbol,
            InstrumentCfg {
                name: row.name,
                sector: row.sector,
                industry: row.industry,
            },
        );
    }

    let mut report = normalize_catalog(&mut cat).context("normalize_catalog failed")?;
    report.duplicates_dropped += dropped;
    debug!(?report, "catalog normalized");
    Ok(cat)
}

/// Read a CSV listing from disk. See [`load_catalog_csv`].
pub fn load_catalog_csv_path(path: impl AsRef<Path>) -> anyhow::Result<Catalog> {
    let file = std::fs::File::open(path.as_ref())
        .with_context(|| format!("open catalog file {}", path.as_ref().display()))?;
    load_catalog_csv(file)
}
