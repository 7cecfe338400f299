//! Per-asset threshold trading
//!
//! Buys when the price drops a set fraction below the last sell, sells when it
//! rises a set fraction above the last buy. Orders double past twice the
//! threshold, buys stop after a run of consecutive buys, and each asset waits
//! out a cooldown after its own latest fill.

use super::portfolio::{Portfolio, Tracking};
use super::{
    cooldown_from_secs, Decision, HoldReason, Strategy, TickError, TickReport, TickStatus,
};
use crate::asset::{AssetRecord, Side, TransactionLedger};
use crate::broker::{OrderIntent, TradingApi};
use crate::config::ThresholdConfig;
use crate::store::StateStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Smallest holding value a sell leaves behind
const SELL_FLOOR: Decimal = dec!(1.00);

/// Immutable threshold parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdParams {
    /// Notional for a normal buy
    pub base_buy: Decimal,
    /// Notional for a normal sell
    pub base_sell: Decimal,
    /// Fractional drop below the reference that triggers a buy
    pub thresh_buy: Decimal,
    /// Fractional rise above the reference that triggers a sell
    pub thresh_sell: Decimal,
    pub cooldown: Duration,
    pub history_minimum: usize,
    pub buy_streak_maximum: usize,
}

impl From<&ThresholdConfig> for ThresholdParams {
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            base_buy: config.base_buy,
            base_sell: config.base_sell.unwrap_or(config.base_buy),
            thresh_buy: config.thresh_buy,
            thresh_sell: config.thresh_sell,
            cooldown: cooldown_from_secs(config.order_cooldown_secs),
            history_minimum: config.history_minimum,
            buy_streak_maximum: config.buy_streak_maximum,
        }
    }
}

/// Pure per-asset decision logic
#[derive(Debug, Clone)]
pub struct ThresholdEngine {
    params: ThresholdParams,
}

impl ThresholdEngine {
    pub fn new(params: ThresholdParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ThresholdParams {
        &self.params
    }

    /// Decide what to do with one asset at `now`
    pub fn evaluate(
        &self,
        record: &AssetRecord,
        ledger: &TransactionLedger,
        now: DateTime<Utc>,
    ) -> Decision {
        let p = &self.params;

        if ledger.has_pending() {
            return Decision::Hold(HoldReason::PendingFill {
                orders: ledger.pending().len(),
            });
        }
        let Some(latest) = ledger.latest() else {
            return Decision::Order(OrderIntent::buy(&record.symbol, p.base_buy));
        };
        if !record.is_owned() {
            return Decision::Order(OrderIntent::buy(&record.symbol, p.base_buy));
        }

        let elapsed = now - latest.timestamp();
        if elapsed < p.cooldown {
            return Decision::Hold(HoldReason::Cooldown {
                remaining_secs: (p.cooldown - elapsed).num_seconds(),
            });
        }

        let history = &record.history;
        if history.len() < p.history_minimum {
            return Decision::Hold(HoldReason::InsufficientHistory {
                have: history.len(),
                need: p.history_minimum,
            });
        }
        let (Some(price), Some(min), Some(max)) =
            (record.current_price(), history.min(), history.max())
        else {
            return Decision::Hold(HoldReason::NoPrice);
        };
        if min.price == max.price {
            return Decision::Hold(HoldReason::NoVariance);
        }

        let buy_ref = ledger.latest_sell().unwrap_or(latest).price();
        let sell_ref = ledger.latest_buy().unwrap_or(latest).price();
        let lower = buy_ref * (Decimal::ONE - p.thresh_buy);
        let upper = sell_ref * (Decimal::ONE + p.thresh_sell);

        if price <= lower {
            let streak = ledger.streak_of(Side::Buy);
            if streak >= p.buy_streak_maximum {
                return Decision::Hold(HoldReason::StreakLimit { streak });
            }
            let mut amount = p.base_buy;
            if price <= buy_ref * (Decimal::ONE - p.thresh_buy * Decimal::TWO) {
                amount *= Decimal::TWO;
            }
            Decision::Order(OrderIntent::buy(&record.symbol, amount))
        } else if price >= upper {
            let mut amount = p.base_sell;
            if price >= sell_ref * (Decimal::ONE + p.thresh_sell * Decimal::TWO) {
                amount *= Decimal::TWO;
            }
            let amount = amount.min((record.value() - SELL_FLOOR).max(Decimal::ZERO));
            if amount.is_zero() {
                return Decision::Hold(HoldReason::NothingToSell);
            }
            Decision::Order(OrderIntent::sell(&record.symbol, amount))
        } else {
            Decision::Hold(HoldReason::WithinBand)
        }
    }
}

/// Threshold strategy over a fixed symbol list
pub struct ThresholdStrategy<B> {
    name: String,
    broker: B,
    store: StateStore,
    engine: ThresholdEngine,
    portfolio: Portfolio,
    symbols: Vec<String>,
}

impl<B: TradingApi> ThresholdStrategy<B> {
    /// Create the strategy, loading any persisted state for `symbols`
    pub fn new(
        name: impl Into<String>,
        broker: B,
        store: StateStore,
        params: ThresholdParams,
        symbols: Vec<String>,
        capacity: usize,
    ) -> Self {
        let name = name.into();
        let portfolio = Portfolio::load(&store, name.clone(), capacity, Some(symbols.as_slice()));
        Self {
            name,
            broker,
            store,
            engine: ThresholdEngine::new(params),
            portfolio,
            symbols,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }
}

#[async_trait]
impl<B: TradingApi> Strategy for ThresholdStrategy<B> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tick(&mut self) -> Result<TickReport, TickError> {
        if !self.broker.market_open().await.map_err(TickError::MarketClock)? {
            tracing::info!(strategy = %self.name, "Market closed, skipping tick");
            return Ok(TickReport::market_closed());
        }

        let now = Utc::now();
        let positions = self.broker.positions().await.map_err(TickError::Reconcile)?;
        let summary = self.portfolio.reconcile(
            &positions,
            Tracking::Symbols {
                symbols: &self.symbols,
                keep_unowned: true,
            },
            now,
        );
        tracing::debug!(?summary, "Reconciled positions");
        self.portfolio.log_summary();

        let mut intents = Vec::new();
        let mut holds = Vec::new();
        for symbol in &self.symbols {
            let Some(record) = self.portfolio.registry().search(symbol) else {
                continue;
            };
            let ledger = self.portfolio.ledger(symbol);
            match self.engine.evaluate(record, &ledger, now) {
                Decision::Order(intent) => {
                    tracing::info!(%symbol, side = %intent.side, notional = %intent.notional, "Order decided");
                    intents.push(intent);
                }
                Decision::Hold(reason) => {
                    tracing::info!(%symbol, %reason, "Holding");
                    holds.push((symbol.clone(), reason));
                }
            }
        }

        let orders = self.portfolio.execute(&self.broker, intents).await;
        let persist_failures = self.portfolio.persist(&self.store, Utc::now());

        Ok(TickReport {
            status: TickStatus::Completed,
            total_value: self.portfolio.registry().total_value(),
            holds,
            orders,
            persist_failures,
        })
    }
}
