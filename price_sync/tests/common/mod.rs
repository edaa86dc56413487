#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use market_data_source::models::{bar::DailyBar, window::DateWindow};
use market_data_source::providers::{MarketDataSource, SourceError};
use price_sync::catalog::InstrumentSpec;
use price_sync::db::{connection, migrate};
use price_sync::models::Instrument;
use price_sync::store::{SqliteStore, TimeSeriesStore};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}
#[derive(QueryableByName)]
struct BusyTimeout {
    #[diesel(sql_type = Integer, column_name = "timeout")]
    busy_timeout: i32,
}
#[derive(QueryableByName)]
struct Count {
    #[diesel(sql_type = BigInt)]
    n: i64,
}
#[derive(QueryableByName)]
struct FkViolation {
    #[diesel(sql_type = Text)]
    table: String,
}

pub struct TestDb {
    _dir: TempDir,    // keep alive for the life of the test
    pub path: String, // <tmpdir>/test.db
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run_all(&path).expect("migrations");

    // open a connection with PRAGMAs applied
    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

/// Migrated database plus a store over it.
pub fn setup_store() -> (TestDb, Arc<SqliteStore>) {
    let (db, _conn) = setup_db();
    let store = Arc::new(SqliteStore::new(db.path.clone()));
    (db, store)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    use diesel::sql_query;

    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal"); // WAL is persistent per DB file

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);

    let bt: BusyTimeout = sql_query("PRAGMA busy_timeout;").get_result(conn).unwrap();
    assert_eq!(bt.busy_timeout, 5000);
}

pub fn count(conn: &mut SqliteConnection, table: &str) -> i64 {
    let c: Count = diesel::sql_query(format!("SELECT COUNT(*) AS n FROM {table};"))
        .get_result(conn)
        .unwrap();
    c.n
}

pub fn fk_check_empty(conn: &mut SqliteConnection) {
    let rows: Vec<FkViolation> = diesel::sql_query("PRAGMA foreign_key_check;")
        .load(conn)
        .unwrap();
    assert!(
        rows.is_empty(),
        "foreign key violations in {:?}",
        rows.iter().map(|r| r.table.as_str()).collect::<Vec<_>>()
    );
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn window(start: NaiveDate, end: NaiveDate) -> DateWindow {
    DateWindow::new(start, end).unwrap()
}

pub fn bar(date: NaiveDate, close: f64) -> DailyBar {
    DailyBar::ohlcv(date, close - 1.0, close + 1.0, close - 2.0, close, 1_000)
}

pub fn instrument(store: &SqliteStore, symbol: &str) -> Instrument {
    store
        .resolve_instrument(&InstrumentSpec::bare(symbol))
        .expect("resolve instrument")
}

/// Scripted [`MarketDataSource`] that counts its calls.
pub struct StubSource {
    calls: AtomicU32,
    answer: Box<dyn Fn(&str, DateWindow, u32) -> Result<Vec<DailyBar>, SourceError> + Send + Sync>,
}

impl StubSource {
    /// `answer(symbol, window, call_number)`; call numbers start at 1.
    pub fn new(
        answer: impl Fn(&str, DateWindow, u32) -> Result<Vec<DailyBar>, SourceError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            answer: Box::new(answer),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for StubSource {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(&self, symbol: &str, window: DateWindow) -> Result<Vec<DailyBar>, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.answer)(symbol, window, n)
    }
}
