use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

/// One mutex per instrument id, created on first use.
///
/// Writes for the same instrument queue up; writes for different instruments don't
/// contend. A poisoned mutex is recovered: the guarded state is `()` and the database
/// transaction already rolled back whatever the panicking writer did.
#[derive(Debug, Default)]
pub struct InstrumentLocks {
    locks: DashMap<i32, Arc<Mutex<()>>>,
}

impl InstrumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex for `instrument_id`. Lock it with [`hold`].
    pub fn get(&self, instrument_id: i32) -> Arc<Mutex<()>> {
        self.locks
            .entry(instrument_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Blocks until `lock` is held.
pub fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}
