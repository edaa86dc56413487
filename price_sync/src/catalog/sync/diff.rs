use std::{collections::BTreeMap, fmt};

use crate::catalog::config::InstrumentCfg;
use crate::catalog::sync::{read::Current, want::Wanted};

/// What needs to change to make DB == catalog.
///
/// Instruments are never deleted: bars reference them by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogDiff {
    pub inserts: BTreeMap<String, InstrumentCfg>,
    pub updates: BTreeMap<String, (InstrumentCfg, InstrumentCfg)>, // symbol -> (old, new)
    pub unchanged: usize,
}

impl CatalogDiff {
    /// True if there is nothing to insert or update.
    pub fn is_noop(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

impl fmt::Display for CatalogDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // helper: section header with underline
        let mut wrote_any = false;
        let mut section = |title: &str,
                           body: &mut dyn FnMut(&mut fmt::Formatter<'_>) -> fmt::Result|
         -> fmt::Result {
            if wrote_any {
                writeln!(f)?;
            }
            writeln!(f, "{title}")?;
            for _ in 0..title.len() {
                write!(f, "-")?;
            }
            writeln!(f)?;
            body(f)?;
            wrote_any = true;
            Ok(())
        };

        if !self.inserts.is_empty() {
            section("Instruments (INSERT)", &mut |f| {
                for (symbol, cfg) in &self.inserts {
                    writeln!(
                        f,
                        "+ {symbol}  \"{}\"  [{} / {}]",
                        cfg.name, cfg.sector, cfg.industry
                    )?;
                }
                Ok(())
            })?;
        }
        if !self.updates.is_empty() {
            section("Instruments (UPDATE)", &mut |f| {
                for (symbol, (old, new)) in &self.updates {
                    for (field, before, after) in [
                        ("name", &old.name, &new.name),
                        ("sector", &old.sector, &new.sector),
                        ("industry", &old.industry, &new.industry),
                    ] {
                        if before != after {
                            writeln!(f, "~ {symbol}  {field}: \"{before}\" → \"{after}\"")?;
                        }
                    }
                }
                Ok(())
            })?;
        }

        if !wrote_any {
            write!(f, "No changes")
        } else {
            Ok(())
        }
    }
}

pub fn make_diff(w: &Wanted, c: &Current) -> CatalogDiff {
    let mut d = CatalogDiff::default();

    for (symbol, want) in &w.instruments {
        match c.instruments.get(symbol) {
            None => {
                d.inserts.insert(symbol.clone(), want.clone());
            }
            Some(have) if have != want => {
                d.updates
                    .insert(symbol.clone(), (have.clone(), want.clone()));
            }
            Some(_) => d.unchanged += 1,
        }
    }

    d
}
