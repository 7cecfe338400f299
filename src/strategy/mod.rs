//! Trading strategies
//!
//! A strategy owns its asset state and runs one tick at a time:
//! - check the market clock
//! - reconcile local state against live positions
//! - decide on orders and submit them one by one
//! - persist state and value logs
//!
//! Two strategies are provided: per-asset threshold trading and
//! portfolio-wide percent allocation.

mod allocation;
mod portfolio;
mod threshold;

pub use allocation::{AllocationEngine, AllocationParams, AllocationPlan, AllocationStrategy};
pub use portfolio::{Portfolio, ReconcileSummary, Tracking};
pub use threshold::{ThresholdEngine, ThresholdParams, ThresholdStrategy};

use crate::asset::{LedgerEntry, PendingFill};
use crate::broker::{BrokerError, OrderIntent, TradingApi};
use crate::config::{Config, StrategyKind, MAX_COOLDOWN_SECS};
use crate::store::StateStore;
use crate::telemetry;
use anyhow::Context;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Cooldown seconds as a signed duration, capped at [`MAX_COOLDOWN_SECS`]
fn cooldown_from_secs(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_COOLDOWN_SECS) as i64)
}

/// Outcome of evaluating one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Place this order
    Order(OrderIntent),
    /// Do nothing this tick
    Hold(HoldReason),
}

impl Decision {
    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            Decision::Order(intent) => Some(intent),
            Decision::Hold(_) => None,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Decision::Hold(_))
    }
}

/// Why no order was placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Last order too recent
    Cooldown { remaining_secs: i64 },
    /// Not enough observed prices yet
    InsufficientHistory { have: usize, need: usize },
    /// No observed price at all
    NoPrice,
    /// Observed prices have no spread
    NoVariance,
    /// Too many consecutive buys
    StreakLimit { streak: usize },
    /// Price inside the buy/sell band
    WithinBand,
    /// Sell would leave less than the minimum holding
    NothingToSell,
    /// Allocation needs at least two owned assets
    TooFewOwned { owned: usize },
    /// Allocation already matches targets
    Balanced,
    /// An earlier order is still waiting for its fill price
    PendingFill { orders: usize },
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::Cooldown { remaining_secs } => {
                write!(f, "order cooldown, {}s remaining", remaining_secs)
            }
            HoldReason::InsufficientHistory { have, need } => {
                write!(f, "price history too short ({}/{})", have, need)
            }
            HoldReason::NoPrice => write!(f, "no observed price"),
            HoldReason::NoVariance => write!(f, "no price variance"),
            HoldReason::StreakLimit { streak } => write!(f, "buy streak limit ({})", streak),
            HoldReason::WithinBand => write!(f, "price within band"),
            HoldReason::NothingToSell => write!(f, "holding too small to sell"),
            HoldReason::TooFewOwned { owned } => {
                write!(f, "need at least 2 owned assets, have {}", owned)
            }
            HoldReason::Balanced => write!(f, "allocation balanced"),
            HoldReason::PendingFill { orders } => {
                write!(f, "{} order(s) awaiting a fill price", orders)
            }
        }
    }
}

/// Result of one submitted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Filled {
        intent: OrderIntent,
        order_id: String,
        entry: LedgerEntry,
    },
    /// Accepted, but no price known yet to record the fill at
    Pending {
        intent: OrderIntent,
        pending: PendingFill,
    },
    Failed {
        intent: OrderIntent,
        error: String,
    },
}

impl OrderOutcome {
    pub fn intent(&self) -> &OrderIntent {
        match self {
            OrderOutcome::Filled { intent, .. }
            | OrderOutcome::Pending { intent, .. }
            | OrderOutcome::Failed { intent, .. } => intent,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, OrderOutcome::Filled { .. })
    }

    /// Accepted by the broker, whether or not the fill is recorded yet
    pub fn is_accepted(&self) -> bool {
        !matches!(self, OrderOutcome::Failed { .. })
    }
}

/// Tick-level status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// Market closed, nothing done
    MarketClosed,
    /// Full tick ran
    Completed,
}

impl TickStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickStatus::MarketClosed => "market_closed",
            TickStatus::Completed => "completed",
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub status: TickStatus,
    /// Portfolio value after the tick
    pub total_value: Decimal,
    /// Assets (or the whole portfolio, keyed by strategy name) that held
    pub holds: Vec<(String, HoldReason)>,
    /// Submitted orders in submission order
    pub orders: Vec<OrderOutcome>,
    /// Persistence failures (logged, not fatal)
    pub persist_failures: usize,
}

impl TickReport {
    pub fn market_closed() -> Self {
        Self {
            status: TickStatus::MarketClosed,
            total_value: Decimal::ZERO,
            holds: Vec::new(),
            orders: Vec::new(),
            persist_failures: 0,
        }
    }

    pub fn filled(&self) -> usize {
        self.orders.iter().filter(|o| o.is_filled()).count()
    }

    /// Accepted orders still waiting for a fill price
    pub fn pending(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| matches!(o, OrderOutcome::Pending { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.orders.iter().filter(|o| !o.is_accepted()).count()
    }
}

/// Errors that abort a tick before any order is placed
#[derive(Debug, Error)]
pub enum TickError {
    #[error("market clock check failed: {0}")]
    MarketClock(#[source] BrokerError),
    #[error("position reconciliation failed: {0}")]
    Reconcile(#[source] BrokerError),
}

/// A tick-driven trading strategy
#[async_trait]
pub trait Strategy: Send {
    /// Name used in logs and the persisted snapshot
    fn name(&self) -> &str;

    /// Run one reconcile/decide/execute/persist cycle
    async fn tick(&mut self) -> Result<TickReport, TickError>;
}

/// Build the configured strategy over a broker
pub fn from_config<B>(config: &Config, broker: B) -> anyhow::Result<Box<dyn Strategy>>
where
    B: TradingApi + 'static,
{
    let store = StateStore::open(&config.strategy.work_dir)
        .with_context(|| format!("opening work dir {}", config.strategy.work_dir.display()))?;
    let capacity = config.assets.history_length;
    let name = format!("{}-{}", config.strategy.kind, config.strategy.tick_secs);

    match config.strategy.kind {
        StrategyKind::Threshold => {
            let section = config
                .threshold
                .as_ref()
                .context("[threshold] section required for the threshold strategy")?;
            Ok(Box::new(ThresholdStrategy::new(
                name,
                broker,
                store,
                ThresholdParams::from(section),
                section.symbols.clone(),
                capacity,
            )))
        }
        StrategyKind::Allocation => {
            let section = config
                .allocation
                .as_ref()
                .context("[allocation] section required for the allocation strategy")?;
            Ok(Box::new(AllocationStrategy::new(
                name,
                broker,
                store,
                AllocationParams::from(section),
                capacity,
            )))
        }
    }
}

/// Run one tick, logging and recording its outcome
pub async fn run_tick<S>(strategy: &mut S) -> Option<TickReport>
where
    S: Strategy + ?Sized,
{
    match strategy.tick().await {
        Ok(report) => {
            tracing::info!(
                strategy = strategy.name(),
                status = report.status.as_str(),
                total_value = %report.total_value,
                filled = report.filled(),
                pending = report.pending(),
                failed = report.failed(),
                holds = report.holds.len(),
                "Tick complete"
            );
            telemetry::record_tick(report.status.as_str());
            Some(report)
        }
        Err(e) => {
            tracing::error!(strategy = strategy.name(), error = %e, "Tick aborted");
            telemetry::record_tick("error");
            None
        }
    }
}

/// Tick forever at a fixed interval until Ctrl-C
pub async fn run_loop<S>(strategy: &mut S, interval: Duration)
where
    S: Strategy + ?Sized,
{
    tracing::info!(
        strategy = strategy.name(),
        interval_secs = interval.as_secs(),
        "Strategy loop started"
    );

    loop {
        run_tick(strategy).await;

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }
}
