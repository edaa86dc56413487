//! instrument upsert statements
use diesel::prelude::*;
use diesel::{ExpressionMethods, RunQueryDsl, SqliteConnection, insert_into};

use crate::catalog::config::InstrumentSpec;
use crate::models::{Instrument, InstrumentUpdate, NewInstrument};
use crate::schema::instrument;

/// Insert the instrument, or rewrite its descriptive fields if the symbol exists.
pub fn upsert_instrument(
    conn: &mut SqliteConnection,
    spec: &InstrumentSpec,
) -> QueryResult<Instrument> {
    let row = NewInstrument {
        symbol: &spec.symbol,
        name: &spec.name,
        sector: &spec.sector,
        industry: &spec.industry,
    };
    insert_into(instrument::table)
        .values(&row)
        .on_conflict(instrument::symbol)
        .do_update()
        .set(InstrumentUpdate {
            name: &spec.name,
            sector: &spec.sector,
            industry: &spec.industry,
        })
        .returning(Instrument::as_returning())
        .get_result(conn)
}

/// Look the symbol up, inserting it when missing. Existing descriptive fields are kept.
pub fn find_or_create_instrument(
    conn: &mut SqliteConnection,
    spec: &InstrumentSpec,
) -> QueryResult<Instrument> {
    if let Some(found) = find_by_symbol(conn, &spec.symbol)? {
        return Ok(found);
    }

    let row = NewInstrument {
        symbol: &spec.symbol,
        name: &spec.name,
        sector: &spec.sector,
        industry: &spec.industry,
    };
    insert_into(instrument::table)
        .values(&row)
        .on_conflict(instrument::symbol)
        .do_nothing()
        .execute(conn)?;

    // a concurrent writer may have won the insert; read back either way
    instrument::table
        .filter(instrument::symbol.eq(&spec.symbol))
        .select(Instrument::as_select())
        .first(conn)
}

/// Instrument by symbol, if present.
pub fn find_by_symbol(
    conn: &mut SqliteConnection,
    symbol: &str,
) -> QueryResult<Option<Instrument>> {
    instrument::table
        .filter(instrument::symbol.eq(symbol))
        .select(Instrument::as_select())
        .first(conn)
        .optional()
}
