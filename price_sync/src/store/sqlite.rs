use std::collections::HashMap;

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::{SqliteConnection, insert_into};
use market_data_source::models::{
    bar::{DailyBar, normalize_series},
    window::DateWindow,
};
use tracing::debug;

use crate::catalog::{InstrumentSpec, repo};
use crate::db::connection::connect_sqlite;
use crate::error::StoreError;
use crate::models::{BarChangeset, Instrument, NewBar, StoredBar};
use crate::schema::{daily_bar, instrument};
use crate::store::locks::{InstrumentLocks, hold};
use crate::store::{RangeQuery, TimeSeriesStore, WriteSummary};

// 8 bound columns per row keeps a chunk far below SQLite's variable limit
const INSERT_CHUNK: usize = 500;

/// [`TimeSeriesStore`] over a SQLite file.
///
/// Every operation opens its own connection (WAL, foreign keys, busy timeout) and drops
/// it when done. Use a file path: an in-memory database would vanish between calls.
#[derive(Debug)]
pub struct SqliteStore {
    database_url: String,
    locks: InstrumentLocks,
}

impl SqliteStore {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            locks: InstrumentLocks::new(),
        }
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    fn conn(&self) -> Result<SqliteConnection, StoreError> {
        connect_sqlite(&self.database_url)
    }
}

fn ensure_instrument(conn: &mut SqliteConnection, id: i32) -> Result<(), StoreError> {
    let n: i64 = instrument::table
        .filter(instrument::id.eq(id))
        .count()
        .get_result(conn)?;
    if n == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(())
}

fn insert_bars(
    conn: &mut SqliteConnection,
    instrument_id: i32,
    rows: &[NewBar],
) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        inserted += insert_into(daily_bar::table)
            .values(chunk)
            .execute(conn)
            .map_err(|e| StoreError::on_write(instrument_id, e))?;
    }
    Ok(inserted)
}

/// Clears non-finite values, drops bars left blank and orders the rest by date, last
/// duplicate winning.
fn prepare(bars: &[DailyBar]) -> Vec<DailyBar> {
    normalize_series(
        bars.iter()
            .cloned()
            .map(DailyBar::sanitized)
            .filter(|b| !b.is_blank())
            .collect(),
    )
}

impl TimeSeriesStore for SqliteStore {
    fn resolve_instrument(&self, spec: &InstrumentSpec) -> Result<Instrument, StoreError> {
        let mut conn = self.conn()?;
        Ok(repo::find_or_create_instrument(&mut conn, spec)?)
    }

    fn instrument(&self, id: i32) -> Result<Instrument, StoreError> {
        let mut conn = self.conn()?;
        Ok(instrument::table
            .find(id)
            .select(Instrument::as_select())
            .first(&mut conn)?)
    }

    fn instrument_by_symbol(&self, symbol: &str) -> Result<Instrument, StoreError> {
        let mut conn = self.conn()?;
        repo::find_by_symbol(&mut conn, symbol)?.ok_or(StoreError::NotFound)
    }

    fn list_instruments(&self, offset: i64, limit: i64) -> Result<Vec<Instrument>, StoreError> {
        let mut conn = self.conn()?;
        Ok(instrument::table
            .order(instrument::id.asc())
            .offset(offset)
            .limit(limit)
            .select(Instrument::as_select())
            .load(&mut conn)?)
    }

    fn replace_range(
        &self,
        instrument_id: i32,
        window: &DateWindow,
        bars: &[DailyBar],
    ) -> Result<WriteSummary, StoreError> {
        let bars = prepare(bars);
        if let Some(stray) = bars.iter().find(|b| !window.contains(b.date)) {
            return Err(StoreError::OutsideWindow {
                date: stray.date,
                window: *window,
            });
        }
        let rows: Vec<NewBar> = bars
            .iter()
            .map(|b| NewBar::from_daily(instrument_id, b))
            .collect();

        let lock = self.locks.get(instrument_id);
        let _guard = hold(&lock);
        let mut conn = self.conn()?;

        let summary = conn.immediate_transaction::<_, StoreError, _>(|conn| {
            ensure_instrument(conn, instrument_id)?;

            let deleted = diesel::delete(
                daily_bar::table
                    .filter(daily_bar::instrument_id.eq(instrument_id))
                    .filter(daily_bar::date.between(window.start(), window.end())),
            )
            .execute(conn)?;
            let inserted = insert_bars(conn, instrument_id, &rows)?;

            Ok(WriteSummary {
                inserted,
                deleted,
                ..Default::default()
            })
        })?;

        debug!(instrument_id, %window, ?summary, "replace-range write");
        Ok(summary)
    }

    fn merge_upsert(
        &self,
        instrument_id: i32,
        bars: &[DailyBar],
    ) -> Result<WriteSummary, StoreError> {
        let bars = prepare(bars);
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Ok(WriteSummary::default());
        };
        let (lo, hi) = (first.date, last.date);

        let lock = self.locks.get(instrument_id);
        let _guard = hold(&lock);
        let mut conn = self.conn()?;

        let summary = conn.immediate_transaction::<_, StoreError, _>(|conn| {
            ensure_instrument(conn, instrument_id)?;

            let existing: HashMap<NaiveDate, StoredBar> = daily_bar::table
                .filter(daily_bar::instrument_id.eq(instrument_id))
                .filter(daily_bar::date.between(lo, hi))
                .select(StoredBar::as_select())
                .load(conn)?
                .into_iter()
                .map(|row| (row.date, row))
                .collect();

            let mut summary = WriteSummary::default();
            let mut fresh = Vec::new();

            for bar in &bars {
                match existing.get(&bar.date) {
                    Some(row) => {
                        let changes = BarChangeset::diff(row, bar);
                        if changes.is_empty() {
                            summary.unchanged += 1;
                            continue;
                        }
                        diesel::update(daily_bar::table.find(row.id))
                            .set(&changes)
                            .execute(conn)
                            .map_err(|e| StoreError::on_write(instrument_id, e))?;
                        summary.updated += 1;
                    }
                    None => fresh.push(NewBar::from_daily(instrument_id, bar)),
                }
            }

            summary.inserted = insert_bars(conn, instrument_id, &fresh)?;
            Ok(summary)
        })?;

        debug!(instrument_id, ?summary, "merge-upsert write");
        Ok(summary)
    }

    fn range(&self, instrument_id: i32, query: &RangeQuery) -> Result<Vec<StoredBar>, StoreError> {
        let mut conn = self.conn()?;

        let mut q = daily_bar::table
            .filter(daily_bar::instrument_id.eq(instrument_id))
            .select(StoredBar::as_select())
            .into_boxed();
        if let Some(start) = query.start {
            q = q.filter(daily_bar::date.ge(start));
        }
        if let Some(end) = query.end {
            q = q.filter(daily_bar::date.le(end));
        }

        Ok(q.order(daily_bar::date.desc())
            .limit(query.limit)
            .load(&mut conn)?)
    }

    fn latest(&self, instrument_id: i32) -> Result<StoredBar, StoreError> {
        let mut conn = self.conn()?;
        Ok(daily_bar::table
            .filter(daily_bar::instrument_id.eq(instrument_id))
            .order(daily_bar::date.desc())
            .select(StoredBar::as_select())
            .first(&mut conn)?)
    }
}
