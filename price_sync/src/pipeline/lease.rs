use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};

/// In-process claims on symbols, shared by every pipeline built from the same registry.
///
/// A pipeline holds the lease for fetch and write. A second run on the same symbol
/// fails fast instead of interleaving with the first.
#[derive(Debug, Clone, Default)]
pub struct LeaseRegistry {
    held: Arc<DashMap<String, ()>>,
}

/// Released on drop.
#[derive(Debug)]
pub struct Lease {
    held: Arc<DashMap<String, ()>>,
    symbol: String,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `symbol`, or `None` when someone else holds it.
    pub fn try_acquire(&self, symbol: &str) -> Option<Lease> {
        match self.held.entry(symbol.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(Lease {
                    held: Arc::clone(&self.held),
                    symbol: symbol.to_string(),
                })
            }
        }
    }

    pub fn is_held(&self, symbol: &str) -> bool {
        self.held.contains_key(symbol)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.held.remove(&self.symbol);
    }
}

/// Cooperative cancellation flag, checked before each instrument starts.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
