use crate::catalog::config::{Catalog, InstrumentCfg};
use std::collections::BTreeMap;

/// Desired instrument metadata, keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wanted {
    pub instruments: BTreeMap<String, InstrumentCfg>,
}

pub fn wanted_from_catalog(cat: &Catalog) -> Wanted {
    Wanted {
        instruments: cat
            .instruments
            .iter()
            .map(|(symbol, cfg)| (symbol.clone(), cfg.clone()))
            .collect(),
    }
}
