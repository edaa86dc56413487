use diesel::prelude::*;
use std::collections::BTreeMap;

use crate::catalog::config::InstrumentCfg;

/// Instrument metadata as currently stored, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct Current {
    pub instruments: BTreeMap<String, InstrumentCfg>,
}

pub fn read_current(conn: &mut SqliteConnection) -> QueryResult<Current> {
    use crate::schema::instrument;

    let instruments = instrument::table
        .select((
            instrument::symbol,
            instrument::name,
            instrument::sector,
            instrument::industry,
        ))
        .load::<(String, String, String, String)>(conn)?
        .into_iter()
        .map(|(symbol, name, sector, industry)| {
            (
                symbol,
                InstrumentCfg {
                    name,
                    sector,
                    industry,
                },
            )
        })
        .collect();

    Ok(Current { instruments })
}
