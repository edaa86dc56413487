use crate::catalog::config::InstrumentSpec;
use crate::catalog::repo::upsert_instrument;
use crate::catalog::sync::diff::CatalogDiff;
use diesel::prelude::*;

/// Apply the diff inside the current transaction.
/// Both inserts and updates go through the symbol upsert.
pub fn apply_diff(conn: &mut SqliteConnection, diff: &CatalogDiff) -> QueryResult<()> {
    let changed = diff
        .inserts
        .iter()
        .chain(diff.updates.iter().map(|(s, (_, new))| (s, new)));

    for (symbol, cfg) in changed {
        let spec = InstrumentSpec {
            symbol: symbol.clone(),
            name: cfg.name.clone(),
            sector: cfg.sector.clone(),
            industry: cfg.industry.clone(),
        };
        upsert_instrument(conn, &spec)?;
    }
    Ok(())
}
