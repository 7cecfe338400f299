//! Strategy-owned asset state
//!
//! Couples the asset registry with per-symbol ledgers and implements the
//! parts of a tick both strategies share: reconciliation against live
//! positions, order submission with fill recording, and persistence.

use super::OrderOutcome;
use crate::asset::{
    AssetRecord, AssetRegistry, LedgerEntry, PendingFill, PricePoint, Side, TransactionLedger,
};
use crate::broker::{OrderIntent, Position, TradingApi};
use crate::store::StateStore;
use crate::telemetry;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

/// Which live positions a strategy tracks
#[derive(Debug, Clone, Copy)]
pub enum Tracking<'a> {
    /// Only the listed symbols. Listed symbols missing upstream are kept with
    /// zero quantity when `keep_unowned`, otherwise dropped.
    Symbols {
        symbols: &'a [String],
        keep_unowned: bool,
    },
    /// Every reported position; anything not reported is dropped
    Everything,
}

impl Tracking<'_> {
    fn includes(&self, symbol: &str) -> bool {
        match self {
            Tracking::Symbols { symbols, .. } => symbols.iter().any(|s| s == symbol),
            Tracking::Everything => true,
        }
    }
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub merged: usize,
    pub removed: usize,
    pub ignored: usize,
    /// Pending orders recorded at this pass's observed prices
    pub settled: usize,
}

/// Registry plus transaction ledgers for the assets a strategy manages
#[derive(Debug, Clone)]
pub struct Portfolio {
    registry: AssetRegistry,
    ledgers: HashMap<String, TransactionLedger>,
    capacity: usize,
}

impl Portfolio {
    /// Create an empty portfolio
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            registry: AssetRegistry::new(name),
            ledgers: HashMap::new(),
            capacity,
        }
    }

    /// Load persisted state for the given symbols, or for every stored
    /// asset when `symbols` is `None`
    ///
    /// Unreadable documents are logged and replaced with fresh state.
    pub fn load(
        store: &StateStore,
        name: impl Into<String>,
        capacity: usize,
        symbols: Option<&[String]>,
    ) -> Self {
        let mut portfolio = Self::new(name, capacity);

        match symbols {
            Some(symbols) => {
                for symbol in symbols {
                    match store.load_asset(symbol, capacity) {
                        Ok(Some((record, ledger))) => portfolio.insert(record, ledger),
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(%symbol, error = %e, "Discarding unreadable asset state")
                        }
                    }
                }
            }
            None => match store.load_all_assets(capacity) {
                Ok(assets) => {
                    for (record, ledger) in assets {
                        portfolio.insert(record, ledger);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to list stored assets"),
            },
        }

        tracing::debug!(assets = portfolio.registry.len(), "Loaded persisted state");
        portfolio
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Ledger for a symbol (empty if no fills yet)
    pub fn ledger(&self, symbol: &str) -> TransactionLedger {
        self.ledgers.get(symbol).cloned().unwrap_or_default()
    }

    /// Borrow a symbol's ledger if it has one
    pub fn ledger_ref(&self, symbol: &str) -> Option<&TransactionLedger> {
        self.ledgers.get(symbol)
    }

    /// Add or merge a record along with its ledger
    pub fn insert(&mut self, record: AssetRecord, ledger: TransactionLedger) {
        let symbol = record.symbol.clone();
        self.registry.update(record);
        if !ledger.is_empty() {
            self.ledgers.insert(symbol, ledger);
        }
    }

    /// Merge live positions into local state
    pub fn reconcile(
        &mut self,
        positions: &[Position],
        tracking: Tracking<'_>,
        now: DateTime<Utc>,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let mut reported = HashSet::new();

        for position in positions {
            if !tracking.includes(&position.symbol) {
                tracing::debug!(symbol = %position.symbol, "Ignoring untracked position");
                summary.ignored += 1;
                continue;
            }
            reported.insert(position.symbol.clone());

            let mut incoming = AssetRecord::new(
                position.symbol.clone(),
                position.asset_id.clone(),
                position.quantity,
                self.capacity,
            );
            let _ = incoming.record_price(PricePoint::new(position.current_price, now));

            match self.registry.update(incoming) {
                crate::asset::UpdateOutcome::Inserted => summary.inserted += 1,
                crate::asset::UpdateOutcome::Merged { .. } => summary.merged += 1,
            }
            summary.settled += self.settle_pending(&position.symbol, position.current_price);
        }

        match tracking {
            Tracking::Symbols {
                symbols,
                keep_unowned: true,
            } => {
                for symbol in symbols {
                    if reported.contains(symbol) {
                        continue;
                    }
                    match self.registry.search_mut(symbol) {
                        Some(record) => record.quantity = Decimal::ZERO,
                        None => {
                            self.registry.update(AssetRecord::new(
                                symbol.clone(),
                                symbol.clone(),
                                Decimal::ZERO,
                                self.capacity,
                            ));
                            summary.inserted += 1;
                        }
                    }
                }
                self.registry.retain(|a| symbols.contains(&a.symbol));
            }
            _ => {
                for symbol in self.registry.symbols() {
                    if !reported.contains(&symbol) {
                        tracing::info!(%symbol, "Stored asset no longer present on the account; dropping");
                        self.registry.remove(&symbol);
                        summary.removed += 1;
                    }
                }
            }
        }

        summary
    }

    /// Record pending orders for `symbol` at an observed price
    ///
    /// The reported position already includes these fills, so quantity is
    /// left alone.
    fn settle_pending(&mut self, symbol: &str, price: Decimal) -> usize {
        let Some(ledger) = self.ledgers.get_mut(symbol) else {
            return 0;
        };
        let settled = ledger.settle_pending(price);
        for entry in &settled {
            tracing::info!(
                %symbol,
                side = %entry.side,
                price = %entry.price(),
                quantity = %entry.quantity,
                "Pending order recorded at observed price"
            );
        }
        settled.len()
    }

    /// Submit intents one by one, recording confirmed fills
    ///
    /// A fill with no price on the receipt is recorded at the latest
    /// observed price. With no observed price either, the order is kept
    /// pending until reconciliation sees one. A failed submission is logged
    /// and reported; it never stops the remaining intents.
    pub async fn execute<B>(&mut self, broker: &B, intents: Vec<OrderIntent>) -> Vec<OrderOutcome>
    where
        B: TradingApi + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(intents.len());

        for intent in intents {
            match broker.submit_order(&intent).await {
                Ok(receipt) => {
                    let filled_at = Utc::now();
                    telemetry::record_order(intent.side, true);

                    let observed = self
                        .registry
                        .search(&intent.symbol)
                        .and_then(AssetRecord::current_price)
                        .filter(|price| *price > Decimal::ZERO);
                    let priced = match (receipt.fill_price(), observed) {
                        (Some(price), _) => Some((price, receipt.filled_quantity)),
                        (None, Some(price)) => Some((price, intent.notional / price)),
                        (None, None) => None,
                    };

                    let Some((price, quantity)) = priced else {
                        let pending = PendingFill {
                            order_id: receipt.id.clone(),
                            side: intent.side,
                            notional: intent.notional,
                            submitted_at: filled_at,
                        };
                        self.ledgers
                            .entry(intent.symbol.clone())
                            .or_default()
                            .add_pending(pending.clone());
                        tracing::warn!(
                            order_id = %receipt.id,
                            symbol = %intent.symbol,
                            side = %intent.side,
                            notional = %intent.notional,
                            "Order accepted without a known price; recording once one is observed"
                        );
                        outcomes.push(OrderOutcome::Pending { intent, pending });
                        continue;
                    };

                    let entry = LedgerEntry::new(intent.side, price, quantity, filled_at);
                    self.apply_fill(&intent.symbol, entry);

                    tracing::info!(
                        order_id = %receipt.id,
                        symbol = %intent.symbol,
                        side = %intent.side,
                        notional = %intent.notional,
                        %price,
                        %quantity,
                        "Order succeeded"
                    );
                    outcomes.push(OrderOutcome::Filled {
                        intent,
                        order_id: receipt.id,
                        entry,
                    });
                }
                Err(e) => {
                    tracing::warn!(symbol = %intent.symbol, side = %intent.side, error = %e, "Order failed");
                    telemetry::record_order(intent.side, false);
                    outcomes.push(OrderOutcome::Failed {
                        intent,
                        error: e.to_string(),
                    });
                }
            }
        }

        outcomes
    }

    fn apply_fill(&mut self, symbol: &str, entry: LedgerEntry) {
        self.ledgers.entry(symbol.to_string()).or_default().append(entry);

        if let Some(record) = self.registry.search_mut(symbol) {
            record.quantity = match entry.side {
                Side::Buy => record.quantity + entry.quantity,
                Side::Sell => (record.quantity - entry.quantity).max(Decimal::ZERO),
            };
            let _ = record.record_price(entry.point);
        }
    }

    /// Save every asset, the snapshot and a CSV value row
    ///
    /// Failures are logged and counted; in-memory state is kept either way.
    pub fn persist(&self, store: &StateStore, now: DateTime<Utc>) -> usize {
        let mut failures = 0;
        let empty = TransactionLedger::new();

        for record in self.registry.iter() {
            let ledger = self.ledgers.get(&record.symbol).unwrap_or(&empty);
            if let Err(e) = store.save_asset(record, ledger) {
                tracing::error!(symbol = %record.symbol, error = %e, "Failed to save asset state");
                failures += 1;
            }
        }
        if let Err(e) = store.save_snapshot(&self.registry, now) {
            tracing::error!(error = %e, "Failed to save snapshot");
            failures += 1;
        }
        if let Err(e) = store.value_log().append(&self.registry, now) {
            tracing::error!(error = %e, "Failed to append value log");
            failures += 1;
        }

        failures
    }

    /// Log each tracked asset and publish value gauges
    pub fn log_summary(&self) {
        let percents = self.registry.percents();
        for asset in self.registry.iter() {
            tracing::info!(
                symbol = %asset.symbol,
                price = ?asset.current_price(),
                quantity = %asset.quantity,
                value = %asset.value(),
                percent = %(percents.get(&asset.symbol).copied().unwrap_or_default() * Decimal::ONE_HUNDRED).round_dp(2),
                ror = %asset.rate_of_return(),
                "Asset"
            );
        }
        tracing::info!(total_value = %self.registry.total_value(), "Portfolio value");
        telemetry::record_portfolio(&self.registry);
    }
}
