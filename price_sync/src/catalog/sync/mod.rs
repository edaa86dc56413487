//! Catalog synchronization (instrument rows and their descriptive metadata).
//!
//! ## What this does
//! - Takes a `Catalog` (TOML, CSV listing or the built-in list) and **normalizes** it.
//! - Computes a **diff** between the catalog (desired) and the DB (current).
//! - Applies the diff with UPSERTs keyed on the symbol (idempotent).
//!
//! ## Transactions & consistency
//! Everything runs inside a single **`BEGIN IMMEDIATE`** transaction via
//! `SqliteConnection::immediate_transaction`, so the diff is computed against the state
//! it is applied to and either the whole diff lands or none of it.
//!
//! ## Dry-run
//! When `SyncOptions::dry_run` is `true`, we return the structured `CatalogDiff` and do
//! **not** write anything. Callers can pretty-print the diff or log it.
//!
//! ## No deletes
//! Instruments missing from the catalog stay in the DB. Their bars still reference them
//! (`ON DELETE RESTRICT`).

pub mod apply;
pub mod diff;
pub mod read;
pub mod want;

use diesel::SqliteConnection;
use tracing::info;

use crate::catalog::config::{Catalog, normalize_catalog};
use crate::catalog::sync::{
    apply::apply_diff,
    diff::{CatalogDiff, make_diff},
    read::read_current,
    want::wanted_from_catalog,
};

/// Options for catalog synchronization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// If true, compute the diff only and print/log what would change.
    pub dry_run: bool,
}

/// Sync the symbol catalog into SQLite.
///
/// Normalizes `cat`, diffs it against the `instrument` table and, unless `opt.dry_run`,
/// inserts new symbols and rewrites changed descriptive fields. Returns the diff.
pub fn sync_catalog(
    conn: &mut SqliteConnection,
    mut cat: Catalog,
    opt: SyncOptions,
) -> anyhow::Result<CatalogDiff> {
    normalize_catalog(&mut cat)?;
    let wanted = wanted_from_catalog(&cat);

    let diff = conn.immediate_transaction::<_, anyhow::Error, _>(|conn| {
        let current = read_current(conn)?;
        let diff = make_diff(&wanted, &current);
        if !opt.dry_run && !diff.is_noop() {
            apply_diff(conn, &diff)?;
        }
        Ok(diff)
    })?;

    info!(
        inserts = diff.inserts.len(),
        updates = diff.updates.len(),
        unchanged = diff.unchanged,
        dry_run = opt.dry_run,
        "catalog sync"
    );
    Ok(diff)
}
