use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_query;
use price_sync::db::connection::connect_sqlite;
use price_sync::store::TimeSeriesStore;
use price_sync::store::{RangeQuery, WriteMode};

mod common;
use common::{bar, d, instrument, setup_store, window};

#[test]
fn sqlite_connection_applies_pragmas() {
    let (db, mut conn) = common::setup_db();
    common::assert_sqlite_pragmas(&mut conn);

    let mut second = connect_sqlite(&db.path).expect("connect second");
    common::assert_sqlite_pragmas(&mut second);

    drop(second);
    common::fk_check_empty(&mut conn);
}

#[test]
fn sqlite_begin_immediate_locking_smoke() {
    let (db, mut conn_a) = common::setup_db();
    let mut conn_b = connect_sqlite(&db.path).expect("connect second");
    // don't wait out the 5s busy timeout
    sql_query("PRAGMA busy_timeout=0;")
        .execute(&mut conn_b)
        .unwrap();

    sql_query("BEGIN IMMEDIATE;")
        .execute(&mut conn_a)
        .expect("begin immediate on first connection");

    let err = sql_query("BEGIN IMMEDIATE;").execute(&mut conn_b);
    assert!(err.is_err(), "expected second BEGIN IMMEDIATE to block");
    if let Err(e) = err {
        match e {
            DieselError::DatabaseError(DatabaseErrorKind::UnableToSendCommand, info) => {
                assert!(info.message().contains("database is locked"));
            }
            DieselError::DatabaseError(_, info) => {
                assert!(info.message().contains("database is locked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    sql_query("ROLLBACK;")
        .execute(&mut conn_a)
        .expect("rollback first connection");

    sql_query("BEGIN IMMEDIATE;")
        .execute(&mut conn_b)
        .expect("begin immediate after release");
    sql_query("ROLLBACK;")
        .execute(&mut conn_b)
        .expect("rollback second connection");
}

#[test]
fn readers_see_committed_writes_from_another_connection() {
    let (_db, store) = setup_store();
    let gold = instrument(&store, "GC=F");
    let w = window(d(2019, 1, 1), d(2019, 1, 5));

    store
        .write(gold.id, WriteMode::ReplaceRange, &w, &[bar(d(2019, 1, 2), 1284.8)])
        .unwrap();

    // a fresh store opens fresh connections
    let reader = price_sync::store::SqliteStore::new(store.database_url());
    let rows = reader
        .range(gold.id, &RangeQuery::new(None, None, 10))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].close, Some(1284.8));
}
