//! Portfolio-wide percent allocation
//!
//! Rebalances owned assets toward a target percent profile, at most once per
//! cooldown window shared by the whole group.

use super::portfolio::{Portfolio, Tracking};
use super::{cooldown_from_secs, HoldReason, Strategy, TickError, TickReport, TickStatus};
use crate::asset::AssetRegistry;
use crate::broker::{OrderIntent, TradingApi};
use crate::config::{AllocationConfig, TargetBasis};
use crate::store::StateStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Immutable allocation parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationParams {
    pub cooldown: Duration,
    pub basis: TargetBasis,
    /// Target percent per symbol; empty means an equal split of owned assets
    pub targets: BTreeMap<String, Decimal>,
}

impl From<&AllocationConfig> for AllocationParams {
    fn from(config: &AllocationConfig) -> Self {
        Self {
            cooldown: cooldown_from_secs(config.order_cooldown_secs),
            basis: config.target_basis,
            targets: config.targets.clone(),
        }
    }
}

/// Result of evaluating the whole group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationPlan {
    Hold(HoldReason),
    Rebalance(Vec<OrderIntent>),
}

/// Pure group-level decision logic
#[derive(Debug, Clone)]
pub struct AllocationEngine {
    params: AllocationParams,
}

impl AllocationEngine {
    pub fn new(params: AllocationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AllocationParams {
        &self.params
    }

    /// Target profile in effect for this registry
    pub fn profile(&self, registry: &AssetRegistry) -> BTreeMap<String, Decimal> {
        if !self.params.targets.is_empty() {
            return self.params.targets.clone();
        }

        let owned: Vec<_> = registry.iter().filter(|a| a.is_owned()).collect();
        if owned.is_empty() {
            return BTreeMap::new();
        }
        let share = Decimal::ONE_HUNDRED / Decimal::from(owned.len());
        owned
            .into_iter()
            .map(|a| (a.symbol.clone(), share))
            .collect()
    }

    /// Decide the rebalancing orders for the group
    pub fn evaluate(
        &self,
        registry: &AssetRegistry,
        last_order: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AllocationPlan {
        if let Some(last) = last_order {
            let elapsed = now - last;
            if elapsed < self.params.cooldown {
                return AllocationPlan::Hold(HoldReason::Cooldown {
                    remaining_secs: (self.params.cooldown - elapsed).num_seconds(),
                });
            }
        }

        let profile = self.profile(registry);
        let participants: Vec<_> = registry
            .iter()
            .filter(|a| a.is_owned() && profile.contains_key(&a.symbol))
            .collect();
        if participants.len() < 2 {
            return AllocationPlan::Hold(HoldReason::TooFewOwned {
                owned: participants.len(),
            });
        }

        let basis: Decimal = match self.params.basis {
            TargetBasis::Owned => participants.iter().map(|a| profile[&a.symbol]).sum(),
            TargetBasis::Configured => profile.values().copied().sum(),
        };
        if basis <= Decimal::ZERO {
            return AllocationPlan::Hold(HoldReason::Balanced);
        }

        let total: Decimal = participants.iter().map(|a| a.value()).sum();
        if total <= Decimal::ZERO {
            return AllocationPlan::Hold(HoldReason::NoPrice);
        }
        let mut intents = Vec::new();
        for asset in participants {
            let should_be = profile[&asset.symbol] / basis;
            let value = asset.value();
            // Orders are placed in whole cents
            let diff = (should_be * total - value).round_dp(2);

            tracing::debug!(
                symbol = %asset.symbol,
                target = %should_be,
                current = %(value / total),
                %diff,
                "Allocation"
            );

            if diff > Decimal::ZERO {
                intents.push(OrderIntent::buy(&asset.symbol, diff));
            } else if diff < Decimal::ZERO {
                intents.push(OrderIntent::sell(&asset.symbol, diff.abs()));
            }
        }

        if intents.is_empty() {
            AllocationPlan::Hold(HoldReason::Balanced)
        } else {
            AllocationPlan::Rebalance(intents)
        }
    }
}

/// Percent allocation strategy over the account's positions
pub struct AllocationStrategy<B> {
    name: String,
    broker: B,
    store: StateStore,
    engine: AllocationEngine,
    portfolio: Portfolio,
}

impl<B: TradingApi> AllocationStrategy<B> {
    /// Create the strategy, loading persisted state for every stored asset
    pub fn new(
        name: impl Into<String>,
        broker: B,
        store: StateStore,
        params: AllocationParams,
        capacity: usize,
    ) -> Self {
        let name = name.into();
        let portfolio = Portfolio::load(&store, name.clone(), capacity, None);
        Self {
            name,
            broker,
            store,
            engine: AllocationEngine::new(params),
            portfolio,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    fn last_order_time(&self) -> Option<DateTime<Utc>> {
        match self.store.load_last_order_time() {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable last order time");
                None
            }
        }
    }
}

#[async_trait]
impl<B: TradingApi> Strategy for AllocationStrategy<B> {
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
        let symbols: Vec<String> = self.engine.params().targets.keys().cloned().collect();
        let tracking = if symbols.is_empty() {
            Tracking::Everything
        } else {
            Tracking::Symbols {
                symbols: &symbols,
                keep_unowned: false,
            }
        };
        let summary = self.portfolio.reconcile(&positions, tracking, now);
        tracing::debug!(?summary, "Reconciled positions");
        self.portfolio.log_summary();

        let mut holds = Vec::new();
        let mut orders = Vec::new();
        match self
            .engine
            .evaluate(self.portfolio.registry(), self.last_order_time(), now)
        {
            AllocationPlan::Hold(reason) => {
                tracing::info!(strategy = %self.name, %reason, "Holding");
                holds.push((self.name.clone(), reason));
            }
            AllocationPlan::Rebalance(intents) => {
                for intent in &intents {
                    tracing::info!(symbol = %intent.symbol, side = %intent.side, notional = %intent.notional, "Order decided");
                }
                if let Err(e) = self.store.save_last_order_time(now) {
                    tracing::error!(error = %e, "Failed to save last order time");
                }
                orders = self.portfolio.execute(&self.broker, intents).await;
            }
        }

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
