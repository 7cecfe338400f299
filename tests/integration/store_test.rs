//! State store integration tests

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal_macros::dec;
use tick_trader::asset::{AssetRecord, AssetRegistry, LedgerEntry, PricePoint, Side, TransactionLedger};
use tick_trader::store::{StateStore, StoreError};

fn t(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn priced(symbol: &str, quantity: rust_decimal::Decimal, prices: &[rust_decimal::Decimal]) -> AssetRecord {
    let mut record = AssetRecord::new(symbol, format!("{}-id", symbol), quantity, 100);
    for (i, price) in prices.iter().enumerate() {
        record
            .record_price(PricePoint::new(*price, t(i as i64)))
            .unwrap();
    }
    record
}

#[test]
fn test_asset_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("nested")).unwrap();

    let record = priced("BRK.B", dec!(1.5), &[dec!(300), dec!(310)]);
    let mut ledger = TransactionLedger::new();
    ledger.append(LedgerEntry::new(Side::Buy, dec!(300), dec!(1.5), t(0)));

    store.save_asset(&record, &ledger).unwrap();
    assert!(dir.path().join("nested/asset_brk_b.json").exists());

    let (loaded, loaded_ledger) = store.load_asset("BRK.B", 100).unwrap().unwrap();
    assert_eq!(loaded.symbol, "BRK.B");
    assert_eq!(loaded.name, "BRK.B-id");
    assert_eq!(loaded.quantity, dec!(1.5));
    assert_eq!(loaded.current_price(), Some(dec!(310)));
    assert_eq!(loaded_ledger, ledger);
}

#[test]
fn test_missing_asset_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    assert!(store.load_asset("SPY", 100).unwrap().is_none());
    assert!(store.load_snapshot().unwrap().is_none());
    assert!(store.load_last_order_time().unwrap().is_none());
}

#[test]
fn test_corrupt_asset_reports_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    std::fs::write(store.asset_path("SPY"), r#"{"symbol": "SPY""#).unwrap();

    let err = store.load_asset("SPY", 100).unwrap_err();
    assert!(matches!(err, StoreError::Json { .. }));
}

#[test]
fn test_load_all_skips_corrupt_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();

    store
        .save_asset(&priced("SPY", dec!(1), &[dec!(10)]), &TransactionLedger::new())
        .unwrap();
    store
        .save_asset(&priced("QQQ", dec!(2), &[dec!(20)]), &TransactionLedger::new())
        .unwrap();
    std::fs::write(store.asset_path("BAD"), "garbage").unwrap();
    std::fs::write(dir.path().join("notes.json"), "{}").unwrap();

    let assets = store.load_all_assets(100).unwrap();
    let symbols: Vec<_> = assets.iter().map(|(r, _)| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["QQQ", "SPY"]);
}

#[test]
fn test_last_order_time_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();

    store.save_last_order_time(t(42)).unwrap();
    assert_eq!(store.load_last_order_time().unwrap(), Some(t(42)));

    std::fs::write(dir.path().join("last_order_time.txt"), "yesterday").unwrap();
    assert!(matches!(
        store.load_last_order_time(),
        Err(StoreError::Timestamp { .. })
    ));
}

#[test]
fn test_snapshot_and_value_logs() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();

    let registry: AssetRegistry = vec![
        priced("SPY", dec!(3), &[dec!(10), dec!(20)]),
        priced("BND", dec!(4), &[dec!(5)]),
    ]
    .into_iter()
    .collect();

    store.save_snapshot(&registry, t(100)).unwrap();
    let snapshot = store.load_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.updated_at, t(100));
    assert_eq!(snapshot.total_value, dec!(80));
    assert_eq!(snapshot.assets[0].percent, dec!(0.75));
    assert_eq!(snapshot.assets[0].rate_of_return, dec!(100));
    assert_eq!(snapshot.assets[1].price, Some(dec!(5)));

    let log = store.value_log();
    log.append(&registry, t(100)).unwrap();
    log.append(&registry, t(200)).unwrap();

    let total = std::fs::read_to_string(log.total_path()).unwrap();
    assert_eq!(total.lines().count(), 3);
    let bnd = std::fs::read_to_string(log.asset_path("BND")).unwrap();
    assert!(bnd.lines().nth(2).unwrap().ends_with(",5,4,20"));
}

#[test]
fn test_save_overwrites_without_leftover_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();

    let mut record = priced("SPY", dec!(1), &[dec!(10)]);
    store.save_asset(&record, &TransactionLedger::new()).unwrap();
    record.quantity = dec!(7);
    store.save_asset(&record, &TransactionLedger::new()).unwrap();

    let (loaded, _) = store.load_asset("SPY", 100).unwrap().unwrap();
    assert_eq!(loaded.quantity, dec!(7));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
}
