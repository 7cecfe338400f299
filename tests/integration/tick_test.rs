//! Full-tick integration tests against the paper broker

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use tick_trader::asset::Side;
use tick_trader::broker::{OrderIntent, PaperBroker};
use tick_trader::config::TargetBasis;
use tick_trader::store::StateStore;
use tick_trader::strategy::{
    AllocationParams, AllocationStrategy, HoldReason, Strategy, ThresholdParams,
    ThresholdStrategy, TickError, TickStatus,
};

fn threshold_params(cooldown_secs: i64) -> ThresholdParams {
    ThresholdParams {
        base_buy: dec!(20),
        base_sell: dec!(20),
        thresh_buy: dec!(0.05),
        thresh_sell: dec!(0.05),
        cooldown: Duration::seconds(cooldown_secs),
        history_minimum: 2,
        buy_streak_maximum: 3,
    }
}

fn allocation_params(targets: &[(&str, Decimal)]) -> AllocationParams {
    AllocationParams {
        cooldown: Duration::hours(24),
        basis: TargetBasis::Owned,
        targets: targets
            .iter()
            .map(|(s, p)| (s.to_string(), *p))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn threshold(
    broker: &PaperBroker,
    store: StateStore,
    cooldown_secs: i64,
) -> ThresholdStrategy<PaperBroker> {
    let symbols = vec!["SPY".to_string()];
    ThresholdStrategy::new(
        "threshold-60",
        broker.clone(),
        store,
        threshold_params(cooldown_secs),
        symbols,
        100,
    )
}

fn allocation(
    broker: &PaperBroker,
    store: StateStore,
    params: AllocationParams,
) -> AllocationStrategy<PaperBroker> {
    AllocationStrategy::new("allocation-60", broker.clone(), store, params, 100)
}

#[tokio::test]
async fn test_threshold_bootstrap_buy() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_price("SPY", dec!(10)).await;

    let mut strategy = threshold(&broker, store.clone(), 3600);
    let report = strategy.tick().await.unwrap();

    assert_eq!(report.status, TickStatus::Completed);
    assert_eq!(report.filled(), 1);
    assert_eq!(broker.orders().await, vec![OrderIntent::buy("SPY", dec!(20))]);
    assert_eq!(broker.quantity("SPY").await, dec!(2));

    let ledger = strategy.portfolio().ledger("SPY");
    let fill = ledger.latest().unwrap();
    assert_eq!(fill.side, Side::Buy);
    assert_eq!(fill.price(), dec!(10));
    assert_eq!(fill.quantity, dec!(2));

    let (record, stored_ledger) = store.load_asset("SPY", 100).unwrap().unwrap();
    assert_eq!(record.quantity, dec!(2));
    assert_eq!(stored_ledger.len(), 1);
}

#[tokio::test]
async fn test_threshold_sells_at_upper_bound() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("SPY", dec!(1), dec!(100)).await;

    let mut strategy = threshold(&broker, store, 0);

    // No fills yet, so the first tick buys in
    let first = strategy.tick().await.unwrap();
    assert_eq!(first.filled(), 1);
    assert_eq!(broker.quantity("SPY").await, dec!(1.2));

    broker.set_price("SPY", dec!(105)).await;
    let second = strategy.tick().await.unwrap();

    assert_eq!(second.filled(), 1);
    let orders = broker.orders().await;
    assert_eq!(orders.last().unwrap(), &OrderIntent::sell("SPY", dec!(20)));
    assert_eq!(
        strategy.portfolio().ledger("SPY").latest().unwrap().side,
        Side::Sell
    );
}

#[tokio::test]
async fn test_threshold_within_band_holds() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("SPY", dec!(1), dec!(100)).await;

    let mut strategy = threshold(&broker, store, 0);
    strategy.tick().await.unwrap();

    broker.set_price("SPY", dec!(101)).await;
    let report = strategy.tick().await.unwrap();

    assert_eq!(report.orders.len(), 0);
    assert_eq!(report.holds, vec![("SPY".to_string(), HoldReason::WithinBand)]);
}

#[tokio::test]
async fn test_threshold_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_price("SPY", dec!(10)).await;

    let mut strategy = threshold(&broker, store.clone(), 3600);
    strategy.tick().await.unwrap();
    drop(strategy);

    let mut restarted = threshold(&broker, store, 3600);
    assert_eq!(restarted.portfolio().ledger("SPY").len(), 1);

    let report = restarted.tick().await.unwrap();
    assert!(report.orders.is_empty());
    assert!(matches!(
        report.holds[0],
        (_, HoldReason::Cooldown { .. })
    ));
}

#[tokio::test]
async fn test_allocation_rebalances_eighty_twenty() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("A", dec!(8), dec!(10)).await;
    broker.set_holding("B", dec!(2), dec!(10)).await;

    let mut strategy = allocation(
        &broker,
        store.clone(),
        allocation_params(&[("A", dec!(50)), ("B", dec!(50))]),
    );
    let report = strategy.tick().await.unwrap();

    assert_eq!(report.filled(), 2);
    assert_eq!(
        broker.orders().await,
        vec![OrderIntent::sell("A", dec!(30)), OrderIntent::buy("B", dec!(30))]
    );
    assert_eq!(broker.quantity("A").await, dec!(5));
    assert_eq!(broker.quantity("B").await, dec!(5));
    assert!(store.load_last_order_time().unwrap().is_some());

    let snapshot = store.load_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.total_value, dec!(100));
    assert_eq!(snapshot.assets.len(), 2);

    // Shared cooldown blocks the next tick
    let next = strategy.tick().await.unwrap();
    assert!(next.orders.is_empty());
    assert!(matches!(next.holds[0].1, HoldReason::Cooldown { .. }));
}

#[tokio::test]
async fn test_allocation_equal_split_without_targets() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("A", dec!(8), dec!(10)).await;
    broker.set_holding("B", dec!(2), dec!(10)).await;

    let mut strategy = allocation(&broker, store, allocation_params(&[]));
    strategy.tick().await.unwrap();

    assert_eq!(broker.quantity("A").await, dec!(5));
    assert_eq!(broker.quantity("B").await, dec!(5));
}

#[tokio::test]
async fn test_allocation_order_failure_is_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("A", dec!(8), dec!(10)).await;
    broker.set_holding("B", dec!(2), dec!(10)).await;
    broker.reject_orders_for("A").await;

    let mut strategy = allocation(
        &broker,
        store.clone(),
        allocation_params(&[("A", dec!(50)), ("B", dec!(50))]),
    );
    let report = strategy.tick().await.unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.filled(), 1);
    assert_eq!(report.orders[0].intent().symbol, "A");
    assert!(!report.orders[0].is_filled());
    assert_eq!(broker.quantity("B").await, dec!(5));
    assert!(strategy.portfolio().ledger_ref("A").is_none());
    // Cooldown starts even though one order failed
    assert!(store.load_last_order_time().unwrap().is_some());
}

#[tokio::test]
async fn test_allocation_drops_divested_assets() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("A", dec!(5), dec!(10)).await;
    broker.set_holding("B", dec!(5), dec!(10)).await;
    broker.set_holding("C", dec!(5), dec!(10)).await;

    let mut strategy = allocation(&broker, store, allocation_params(&[]));
    strategy.tick().await.unwrap();
    assert_eq!(strategy.portfolio().registry().len(), 3);

    broker.set_holding("C", Decimal::ZERO, dec!(10)).await;
    strategy.tick().await.unwrap();
    assert_eq!(strategy.portfolio().registry().symbols(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_market_closed_skips_tick() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("A", dec!(8), dec!(10)).await;
    broker.set_holding("B", dec!(2), dec!(10)).await;
    broker.set_market_open(false).await;

    let mut strategy = allocation(
        &broker,
        store.clone(),
        allocation_params(&[("A", dec!(50)), ("B", dec!(50))]),
    );
    let report = strategy.tick().await.unwrap();

    assert_eq!(report.status, TickStatus::MarketClosed);
    assert!(broker.orders().await.is_empty());
    assert!(store.load_snapshot().unwrap().is_none());
}

#[tokio::test]
async fn test_offline_broker_aborts_tick() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_price("SPY", dec!(10)).await;
    broker.set_offline(true).await;

    let mut strategy = threshold(&broker, store.clone(), 0);
    let result = strategy.tick().await;

    assert!(matches!(result, Err(TickError::MarketClock(_))));
    assert!(broker.orders().await.is_empty());
    assert!(store.load_snapshot().unwrap().is_none());
}

#[tokio::test]
async fn test_positions_failure_aborts_tick() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_price("SPY", dec!(10)).await;
    broker.set_positions_unavailable(true).await;

    let mut strategy = threshold(&broker, store.clone(), 0);
    let result = strategy.tick().await;

    assert!(matches!(result, Err(TickError::Reconcile(_))));
    assert!(broker.orders().await.is_empty());
    assert!(store.load_snapshot().unwrap().is_none());
}

#[tokio::test]
async fn test_persist_failure_is_counted_and_state_kept() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    // A directory where the asset document belongs makes its save fail
    std::fs::create_dir(store.asset_path("SPY")).unwrap();
    let broker = PaperBroker::new();
    broker.set_price("SPY", dec!(10)).await;

    let mut strategy = threshold(&broker, store.clone(), 3600);
    let report = strategy.tick().await.unwrap();

    assert_eq!(report.status, TickStatus::Completed);
    assert_eq!(report.persist_failures, 1);
    assert_eq!(report.filled(), 1);
    assert_eq!(strategy.portfolio().ledger("SPY").len(), 1);
    assert_eq!(strategy.portfolio().registry().search("SPY").unwrap().quantity, dec!(2));
    assert!(store.load_snapshot().unwrap().is_some());

    // The next tick still sees the fill and waits out the cooldown
    let next = strategy.tick().await.unwrap();
    assert!(next.orders.is_empty());
    assert!(matches!(next.holds[0].1, HoldReason::Cooldown { .. }));
}

#[tokio::test]
async fn test_unpriced_receipt_for_held_asset_uses_observed_price() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_holding("A", dec!(8), dec!(10)).await;
    broker.set_holding("B", dec!(2), dec!(10)).await;
    broker.set_pending(true).await;

    let mut strategy = allocation(
        &broker,
        store,
        allocation_params(&[("A", dec!(50)), ("B", dec!(50))]),
    );
    let report = strategy.tick().await.unwrap();

    assert_eq!(report.filled(), 2);
    assert_eq!(report.pending(), 0);
    let fill = *strategy.portfolio().ledger("B").latest().unwrap();
    assert_eq!(fill.side, Side::Buy);
    assert_eq!(fill.price(), dec!(10));
    assert_eq!(fill.quantity, dec!(3));
}

#[tokio::test]
async fn test_unpriced_bootstrap_buy_waits_for_a_price_instead_of_selling() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    let broker = PaperBroker::new();
    broker.set_price("SPY", dec!(100)).await;
    broker.set_pending(true).await;

    let mut strategy = threshold(&broker, store.clone(), 0);

    // Not held yet, so nothing has been observed to price the fill with
    let first = strategy.tick().await.unwrap();
    assert_eq!(first.pending(), 1);
    assert_eq!(first.filled(), 0);
    assert!(strategy.portfolio().ledger("SPY").latest().is_none());
    let (_, stored) = store.load_asset("SPY", 100).unwrap().unwrap();
    assert_eq!(stored.pending().len(), 1);

    // The position now reports a price and the buy is recorded at it
    let second = strategy.tick().await.unwrap();
    assert!(second.orders.is_empty());
    let ledger = strategy.portfolio().ledger("SPY");
    assert!(!ledger.has_pending());
    let fill = ledger.latest_buy().unwrap();
    assert_eq!(fill.price(), dec!(100));
    assert_eq!(fill.quantity, dec!(0.2));

    // A small dip stays inside the band rather than tripping a sell
    broker.set_price("SPY", dec!(99)).await;
    let third = strategy.tick().await.unwrap();
    assert!(third.orders.is_empty());
    assert_eq!(third.holds, vec![("SPY".to_string(), HoldReason::WithinBand)]);
    assert_eq!(broker.orders().await, vec![OrderIntent::buy("SPY", dec!(20))]);
}
