//! End-to-end integration tests

use rust_decimal_macros::dec;
use tick_trader::broker::PaperBroker;
use tick_trader::config::{Config, LogFormat, StrategyKind, TargetBasis};
use tick_trader::store::StateStore;
use tick_trader::strategy::{self, TickStatus};

const EXAMPLE: &str = include_str!("../../config.toml.example");

#[test]
fn test_config_example_loads() {
    let config = Config::from_toml(EXAMPLE).unwrap();

    assert_eq!(config.strategy.kind, StrategyKind::Threshold);
    assert_eq!(config.assets.history_length, 100);
    assert_eq!(config.api.timeout_secs, 10);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);

    let threshold = config.threshold.unwrap();
    assert_eq!(threshold.base_buy, dec!(20));
    assert_eq!(threshold.symbols, vec!["SPY", "QQQ"]);

    let allocation = config.allocation.unwrap();
    assert_eq!(allocation.target_basis, TargetBasis::Owned);
    assert_eq!(allocation.targets["SPY"], dec!(60));
}

fn config_in(dir: &std::path::Path, kind: &str) -> Config {
    let toml = EXAMPLE
        .replace("kind = \"threshold\"", &format!("kind = \"{}\"", kind))
        .replace("tick_secs = 3600", "tick_secs = 900")
        .replace("work_dir = \"./work\"", &format!("work_dir = {:?}", dir.display().to_string()));
    Config::from_toml(&toml).unwrap()
}

#[tokio::test]
async fn test_threshold_from_config_runs_tick() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "threshold");

    let broker = PaperBroker::new();
    broker.set_price("SPY", dec!(400)).await;
    broker.set_price("QQQ", dec!(250)).await;

    let mut strategy = strategy::from_config(&config, broker.clone()).unwrap();
    assert_eq!(strategy.name(), "threshold-900");

    let report = strategy::run_tick(strategy.as_mut()).await.unwrap();
    assert_eq!(report.status, TickStatus::Completed);
    assert_eq!(report.filled(), 2);
    assert_eq!(broker.orders().await.len(), 2);

    let store = StateStore::open(dir.path()).unwrap();
    let snapshot = store.load_snapshot().unwrap().unwrap();
    assert_eq!(snapshot.name, "threshold-900");
    assert_eq!(snapshot.total_value, dec!(40));
    assert!(dir.path().join("value_total.csv").exists());
    assert!(dir.path().join("value_spy.csv").exists());
}

#[tokio::test]
async fn test_allocation_from_config_runs_tick() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "allocation");

    let broker = PaperBroker::new();
    broker.set_holding("SPY", dec!(5), dec!(10)).await;
    broker.set_holding("QQQ", dec!(5), dec!(10)).await;
    broker.set_holding("TSLA", dec!(1), dec!(200)).await;

    let mut strategy = strategy::from_config(&config, broker.clone()).unwrap();
    assert_eq!(strategy.name(), "allocation-900");

    let report = strategy::run_tick(strategy.as_mut()).await.unwrap();
    assert_eq!(report.filled(), 2);
    // 60/40 of the 100 held in targeted assets; TSLA is left alone
    assert_eq!(broker.quantity("SPY").await, dec!(6));
    assert_eq!(broker.quantity("QQQ").await, dec!(4));
    assert_eq!(broker.quantity("TSLA").await, dec!(1));
}

#[tokio::test]
async fn test_run_tick_reports_none_on_abort() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), "threshold");

    let broker = PaperBroker::new();
    broker.set_offline(true).await;

    let mut strategy = strategy::from_config(&config, broker).unwrap();
    assert!(strategy::run_tick(strategy.as_mut()).await.is_none());
}
