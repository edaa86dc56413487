use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use market_data_source::{
    models::window::DateWindow,
    providers::{
        MarketDataSource,
        csv_file::{CsvColumns, CsvFileSource},
        yahoo_chart::YahooChartProvider,
    },
};
use price_sync::{
    catalog::{
        Catalog,
        config::{builtin_catalog, load_catalog_csv_path, load_catalog_path},
        sync::{SyncOptions, sync_catalog},
    },
    config::SyncConfig,
    db::{connection::connect_sqlite, migrate},
    pipeline::{AbortSignal, IngestionPipeline, RetryPolicy},
    query::{BarsQuery, QueryService},
    store::{SqliteStore, TimeSeriesStore, WriteMode},
};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Daily price history sync")]
struct Cli {
    /// Run configuration (TOML). Defaults apply when omitted.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply pending schema migrations.
    Migrate,
    Catalog(CatalogCmd),
    /// Fetch the configured window for every catalog instrument and store it.
    Ingest {
        #[arg(long, value_enum)]
        mode: Option<WriteMode>,
        /// Only these symbols (repeatable). Defaults to the whole catalog.
        #[arg(long = "symbol", value_name = "SYMBOL")]
        symbols: Vec<String>,
    },
    /// Load an auxiliary indicator series for one symbol from a CSV file.
    ImportIndicator {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "dtcai")]
        column: String,
        #[arg(long, value_enum, default_value_t = WriteMode::MergeUpsert)]
        mode: WriteMode,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// List tracked instruments.
    Instruments {
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Stored bars of one symbol, newest first.
    Bars {
        #[arg(long)]
        symbol: String,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Most recent bar of one symbol.
    Latest {
        #[arg(long)]
        symbol: String,
    },
    /// The last N days of one symbol.
    Trailing {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        days: u32,
    },
}

#[derive(Args)]
struct CatalogCmd {
    #[command(subcommand)]
    sub: CatalogSub,
}

#[derive(Subcommand)]
enum CatalogSub {
    /// Upsert the instruments of a catalog file.
    Sync {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Treat the file as a CSV constituent listing.
        #[arg(long)]
        csv: bool,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long)]
    end: Option<NaiveDate>,
    #[arg(long)]
    limit: Option<i64>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_catalog(path: &Path, csv: bool) -> Result<Catalog> {
    let is_csv = csv
        || path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        load_catalog_csv_path(path)
    } else {
        load_catalog_path(path)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Flips `abort` on Ctrl-C so no further instruments start.
fn abort_on_ctrl_c() -> AbortSignal {
    let abort = AbortSignal::new();
    let flag = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight instruments");
            flag.abort();
        }
    });
    abort
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::from_env(),
    };
    let today = Local::now().date_naive();

    match cli.cmd {
        Cmd::Migrate => {
            migrate::run_all(&cfg.database_url)?;
        }

        Cmd::Catalog(CatalogCmd {
            sub: CatalogSub::Sync { file, csv, dry_run },
        }) => {
            let cat = load_catalog(&file, csv)?;
            migrate::run_all(&cfg.database_url)?;
            let mut conn = connect_sqlite(&cfg.database_url)?;
            let diff = sync_catalog(&mut conn, cat, SyncOptions { dry_run })?;
            println!("{diff}");
        }

        Cmd::Ingest { mode, symbols } => {
            let catalog = match &cfg.catalog {
                Some(path) => load_catalog(path, false)?,
                None => builtin_catalog(),
            };
            let specs = if symbols.is_empty() {
                catalog.specs()
            } else {
                catalog.select(&symbols)
            };

            let mut options = cfg.to_ingest_options(today)?;
            if let Some(mode) = mode {
                options.mode = mode;
            }

            migrate::run_all(&cfg.database_url)?;
            let source: Arc<dyn MarketDataSource> =
                Arc::new(YahooChartProvider::with_config(cfg.to_yahoo_config())?);
            let store: Arc<dyn TimeSeriesStore> = Arc::new(SqliteStore::new(&cfg.database_url));
            let pipeline = IngestionPipeline::new(source, store, options);

            let report = pipeline.run_batch(&specs, &abort_on_ctrl_c()).await;
            println!("{report}");
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Cmd::ImportIndicator {
            file,
            symbol,
            column,
            mode,
            start,
            end,
        } => {
            let default_window = cfg.to_window(today)?;
            let window = DateWindow::new(
                start.unwrap_or(default_window.start()),
                end.unwrap_or(default_window.end()),
            )?;

            let specs = builtin_catalog().select(std::slice::from_ref(&symbol));
            let source: Arc<dyn MarketDataSource> = Arc::new(
                CsvFileSource::new(CsvColumns::indicator_only(column)).with_file(&symbol, &file),
            );

            let mut options = cfg.to_ingest_options(today)?;
            options.window = window;
            options.mode = mode;
            options.retry = RetryPolicy::immediate(1);

            migrate::run_all(&cfg.database_url)?;
            let store: Arc<dyn TimeSeriesStore> = Arc::new(SqliteStore::new(&cfg.database_url));
            let pipeline = IngestionPipeline::new(source, store, options);

            info!(%symbol, file = %file.display(), "importing indicator");
            let report = pipeline.run_batch(&specs, &AbortSignal::new()).await;
            println!("{report}");
            if !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Cmd::Instruments { offset, limit } => {
            let query = query_service(&cfg);
            print_json(&query.list_instruments(offset, limit)?)?;
        }

        Cmd::Bars { symbol, range } => {
            let query = query_service(&cfg);
            let bars = query
                .bars_by_symbol(
                    &symbol,
                    BarsQuery {
                        start: range.start,
                        end: range.end,
                        limit: range.limit,
                    },
                )
                .with_context(|| format!("reading bars of {symbol}"))?;
            print_json(&bars)?;
        }

        Cmd::Latest { symbol } => {
            let query = query_service(&cfg);
            let instrument = query
                .instrument_by_symbol(&symbol)
                .with_context(|| format!("unknown symbol {symbol}"))?;
            print_json(&query.latest(instrument.id)?)?;
        }

        Cmd::Trailing { symbol, days } => {
            let query = query_service(&cfg);
            print_json(&query.trailing(&symbol, days, today)?)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn query_service(cfg: &SyncConfig) -> QueryService {
    QueryService::new(Arc::new(SqliteStore::new(&cfg.database_url)))
}
