mod common;
use common::{bar, d, instrument, setup_store, window};

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use market_data_source::models::{bar::DailyBar, window::DateWindow};
use price_sync::error::StoreError;
use price_sync::models::StoredBar;
use price_sync::store::{RangeQuery, SqliteStore, TimeSeriesStore, WriteMode, WriteSummary};
use proptest::prelude::*;

fn all(store: &SqliteStore, id: i32) -> Vec<StoredBar> {
    store.range(id, &RangeQuery::new(None, None, 10_000)).unwrap()
}

fn dates(rows: &[StoredBar]) -> Vec<NaiveDate> {
    rows.iter().map(|r| r.date).collect()
}

#[test]
fn replace_range_stores_exactly_the_fetched_days() {
    let (_db, store) = setup_store();
    let gold = instrument(&store, "GC=F");
    let w = window(d(2019, 1, 1), d(2019, 1, 5));

    let fetched = vec![
        bar(d(2019, 1, 2), 1284.8),
        bar(d(2019, 1, 3), 1294.8),
        bar(d(2019, 1, 4), 1286.8),
    ];
    let summary = store
        .write(gold.id, WriteMode::ReplaceRange, &w, &fetched)
        .unwrap();
    assert_eq!(summary.inserted, 3);

    let rows = all(&store, gold.id);
    assert_eq!(
        dates(&rows),
        vec![d(2019, 1, 4), d(2019, 1, 3), d(2019, 1, 2)]
    );
}

#[test]
fn replace_range_is_destructive_inside_the_window_only() {
    let (_db, store) = setup_store();
    let spx = instrument(&store, "^GSPC");

    let seed: Vec<DailyBar> = (1..=10).map(|day| bar(d(2020, 3, day), 100.0)).collect();
    store
        .replace_range(spx.id, &window(d(2020, 3, 1), d(2020, 3, 10)), &seed)
        .unwrap();

    let w = window(d(2020, 3, 3), d(2020, 3, 6));
    let summary = store
        .replace_range(
            spx.id,
            &w,
            &[bar(d(2020, 3, 4), 200.0), bar(d(2020, 3, 5), 201.0)],
        )
        .unwrap();
    assert_eq!(summary.deleted, 4);
    assert_eq!(summary.inserted, 2);

    let rows = all(&store, spx.id);
    let inside: Vec<_> = rows.iter().filter(|r| w.contains(r.date)).collect();
    assert_eq!(inside.len(), 2);
    assert!(inside.iter().all(|r| r.close.unwrap() >= 200.0));

    // 1, 2 and 7..=10 survive
    assert_eq!(rows.len(), 8);
    assert!(
        rows.iter()
            .filter(|r| !w.contains(r.date))
            .all(|r| r.close == Some(100.0))
    );
}

#[test]
fn replace_range_rejects_bars_outside_the_window() {
    let (_db, store) = setup_store();
    let gold = instrument(&store, "GC=F");
    let w = window(d(2019, 1, 1), d(2019, 1, 5));
    store
        .replace_range(gold.id, &w, &[bar(d(2019, 1, 2), 1.0)])
        .unwrap();

    let err = store
        .replace_range(
            gold.id,
            &w,
            &[bar(d(2019, 1, 3), 2.0), bar(d(2019, 1, 6), 3.0)],
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::OutsideWindow { date, .. } if date == d(2019, 1, 6)));

    // nothing was touched
    assert_eq!(dates(&all(&store, gold.id)), vec![d(2019, 1, 2)]);
}

#[test]
fn merge_upsert_twice_changes_nothing_the_second_time() {
    let (_db, store) = setup_store();
    let btc = instrument(&store, "BTC-USD");
    let fetched: Vec<DailyBar> = (1..=5).map(|day| bar(d(2021, 6, day), 35_000.0)).collect();

    let first = store.merge_upsert(btc.id, &fetched).unwrap();
    assert_eq!(first.inserted, 5);
    let snapshot = all(&store, btc.id);

    let second = store.merge_upsert(btc.id, &fetched).unwrap();
    assert_eq!(
        second,
        WriteSummary {
            unchanged: 5,
            ..Default::default()
        }
    );
    assert_eq!(all(&store, btc.id), snapshot);
}

#[test]
fn merge_upsert_keeps_fields_the_fetch_did_not_supply() {
    let (_db, store) = setup_store();
    let spx = instrument(&store, "^GSPC");
    let day = d(2022, 8, 1);

    store
        .merge_upsert(spx.id, &[DailyBar::empty(day).with_indicator(0.42)])
        .unwrap();

    let summary = store.merge_upsert(spx.id, &[bar(day, 4118.6)]).unwrap();
    assert_eq!(summary.updated, 1);

    let row = store.latest(spx.id).unwrap();
    assert_eq!(row.close, Some(4118.6));
    assert_eq!(row.volume, Some(1_000));
    assert_eq!(row.indicator, Some(0.42), "indicator must survive a price refresh");

    // and the other way round
    store
        .merge_upsert(spx.id, &[DailyBar::empty(day).with_indicator(0.5)])
        .unwrap();
    let row = store.latest(spx.id).unwrap();
    assert_eq!(row.close, Some(4118.6));
    assert_eq!(row.indicator, Some(0.5));
}

#[test]
fn replace_range_drops_what_the_fetch_did_not_supply() {
    let (_db, store) = setup_store();
    let spx = instrument(&store, "^GSPC");
    let day = d(2022, 8, 1);
    let w = window(day, day);

    store
        .merge_upsert(spx.id, &[bar(day, 4118.6).with_indicator(0.42)])
        .unwrap();
    store
        .replace_range(spx.id, &w, &[bar(day, 4120.0)])
        .unwrap();

    assert_eq!(store.latest(spx.id).unwrap().indicator, None);
}

#[test]
fn blank_bars_are_ignored_and_duplicates_collapse() {
    let (_db, store) = setup_store();
    let fx = instrument(&store, "EURUSD=X");
    let w = window(d(2023, 1, 2), d(2023, 1, 6));

    let summary = store
        .replace_range(
            fx.id,
            &w,
            &[
                bar(d(2023, 1, 3), 1.05),
                DailyBar::empty(d(2023, 1, 4)),
                bar(d(2023, 1, 3), 1.06),
            ],
        )
        .unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(store.latest(fx.id).unwrap().close, Some(1.06));
}

#[test]
fn merge_upsert_ignores_a_nan_close() {
    let (_db, store) = setup_store();
    let gold = instrument(&store, "GC=F");
    let day = d(2019, 1, 2);
    store.merge_upsert(gold.id, &[bar(day, 1284.8)]).unwrap();

    let summary = store
        .merge_upsert(
            gold.id,
            &[DailyBar::empty(day).with_close(f64::NAN).with_indicator(0.7)],
        )
        .unwrap();
    assert_eq!(summary.updated, 1);

    let row = store.latest(gold.id).unwrap();
    assert_eq!(row.close, Some(1284.8), "a NaN must not wipe the stored close");
    assert_eq!(row.indicator, Some(0.7));

    // nothing usable left
    let summary = store
        .merge_upsert(gold.id, &[DailyBar::empty(day).with_close(f64::NAN)])
        .unwrap();
    assert_eq!(summary, WriteSummary::default());
    assert_eq!(store.latest(gold.id).unwrap().close, Some(1284.8));
}

#[test]
fn replace_range_never_stores_infinity() {
    let (_db, store) = setup_store();
    let spx = instrument(&store, "^GSPC");
    let w = window(d(2020, 3, 2), d(2020, 3, 6));

    let mut spiky = bar(d(2020, 3, 3), 2500.0);
    spiky.high = Some(f64::INFINITY);
    let summary = store
        .replace_range(
            spx.id,
            &w,
            &[
                spiky,
                DailyBar::empty(d(2020, 3, 4)).with_close(f64::NEG_INFINITY),
            ],
        )
        .unwrap();
    assert_eq!(summary.inserted, 1, "a bar left blank is dropped");

    let rows = all(&store, spx.id);
    assert_eq!(dates(&rows), vec![d(2020, 3, 3)]);
    assert_eq!(rows[0].high, None);
    assert_eq!(rows[0].close, Some(2500.0));
}

/// Closes by date after applying each replace-range write in order.
fn serial(writes: &[(&Vec<DailyBar>, DateWindow)]) -> BTreeMap<NaiveDate, f64> {
    let mut state = BTreeMap::new();
    for (set, w) in writes {
        state.retain(|date: &NaiveDate, _| !w.contains(*date));
        state.extend(set.iter().map(|b| (b.date, b.close.unwrap())));
    }
    state
}

#[test]
fn concurrent_replace_range_on_one_instrument_never_mixes() {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let (_db, store) = setup_store();
    let gold = instrument(&store, "GC=F").id;
    let day = |n: u32| d(2019, 1, n);
    let wa = window(day(1), day(8));
    let wb = window(day(3), day(10));
    let full = window(day(1), day(10));

    let set_a: Vec<DailyBar> = [1, 3, 5, 7].into_iter().map(|n| bar(day(n), 100.0)).collect();
    let set_b: Vec<DailyBar> = [4, 6, 8, 10].into_iter().map(|n| bar(day(n), 200.0)).collect();

    let a_then_b = serial(&[(&set_a, wa), (&set_b, wb)]);
    let b_then_a = serial(&[(&set_b, wb), (&set_a, wa)]);

    for round in 0..30 {
        store.replace_range(gold, &full, &[]).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [(set_a.clone(), wa), (set_b.clone(), wb)]
            .into_iter()
            .map(|(set, w)| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.replace_range(gold, &w, &set).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let held: BTreeMap<NaiveDate, f64> = store
            .range(gold, &RangeQuery::new(Some(full.start()), Some(full.end()), 1000))
            .unwrap()
            .into_iter()
            .map(|r| (r.date, r.close.unwrap()))
            .collect();
        assert!(
            held == a_then_b || held == b_then_a,
            "round {round}: window holds a mix of both writes: {held:?}"
        );
    }
}

#[test]
fn writes_to_unknown_instruments_fail() {
    let (_db, store) = setup_store();
    let w = window(d(2019, 1, 1), d(2019, 1, 5));

    assert!(matches!(
        store.replace_range(999, &w, &[bar(d(2019, 1, 2), 1.0)]),
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.merge_upsert(999, &[bar(d(2019, 1, 2), 1.0)]),
        Err(StoreError::NotFound)
    ));
}

#[test]
fn latest_of_an_empty_instrument_is_not_found() {
    let (_db, store) = setup_store();
    let tnx = instrument(&store, "^TNX");
    assert!(matches!(store.latest(tnx.id), Err(StoreError::NotFound)));
    assert!(all(&store, tnx.id).is_empty());
}

#[test]
fn range_honours_limit_and_bounds() {
    let (_db, store) = setup_store();
    let gold = instrument(&store, "GC=F");
    let bars: Vec<DailyBar> = (1..=20).map(|day| bar(d(2019, 2, day), 1300.0)).collect();
    store.merge_upsert(gold.id, &bars).unwrap();

    let rows = store
        .range(
            gold.id,
            &RangeQuery::new(Some(d(2019, 2, 5)), Some(d(2019, 2, 15)), 3),
        )
        .unwrap();
    assert_eq!(
        dates(&rows),
        vec![d(2019, 2, 15), d(2019, 2, 14), d(2019, 2, 13)]
    );

    // other instruments never leak in
    let other = instrument(&store, "^GSPC");
    assert!(all(&store, other.id).is_empty());
}

#[test]
fn resolve_instrument_is_stable() {
    let (_db, store) = setup_store();
    let a = instrument(&store, "GC=F");
    let b = instrument(&store, "GC=F");
    assert_eq!(a, b);
    assert_eq!(store.instrument_by_symbol("GC=F").unwrap().id, a.id);
    assert!(matches!(
        store.instrument_by_symbol("gc=f"),
        Err(StoreError::NotFound)
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn range_returns_sorted_unique_bars_within_bounds(
        offsets in prop::collection::vec(0u64..60, 0..40),
        lo in 0u64..60,
        span in 0u64..60,
    ) {
        let (_db, store) = setup_store();
        let id = instrument(&store, "GC=F").id;
        let base = d(2019, 1, 1);
        let day = |n: u64| base.checked_add_days(Days::new(n)).unwrap();

        let bars: Vec<DailyBar> = offsets
            .iter()
            .enumerate()
            .map(|(i, n)| bar(day(*n), i as f64 + 10.0))
            .collect();
        store.merge_upsert(id, &bars).unwrap();

        let (start, end) = (day(lo), day(lo + span));
        let rows = store
            .range(id, &RangeQuery::new(Some(start), Some(end), 1000))
            .unwrap();

        // last write per date wins
        let mut expected: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for b in &bars {
            if b.date >= start && b.date <= end {
                expected.insert(b.date, b.close.unwrap());
            }
        }

        prop_assert!(rows.iter().all(|r| r.date >= start && r.date <= end));
        prop_assert!(rows.windows(2).all(|w| w[0].date > w[1].date));
        prop_assert_eq!(rows.len(), expected.len());
        for r in &rows {
            prop_assert_eq!(r.close, expected.get(&r.date).copied());
        }
    }
}
