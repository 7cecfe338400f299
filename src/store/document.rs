//! On-disk document formats

use crate::asset::{
    AssetRecord, AssetRegistry, LedgerEntry, PendingFill, PriceHistory, PricePoint,
    TransactionLedger,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-asset state: record plus transaction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDocument {
    pub symbol: String,
    pub name: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub history: Vec<PricePoint>,
    #[serde(default)]
    pub thistory: Vec<LedgerEntry>,
    /// Accepted orders still waiting for a price
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<PendingFill>,
}

impl AssetDocument {
    pub fn from_state(record: &AssetRecord, ledger: &TransactionLedger) -> Self {
        Self {
            symbol: record.symbol.clone(),
            name: record.name.clone(),
            quantity: record.quantity,
            history: record.history.iter().copied().collect(),
            thistory: ledger.entries().to_vec(),
            pending: ledger.pending().to_vec(),
        }
    }

    /// Rebuild in-memory state, re-applying the history ordering guard
    pub fn into_state(self, capacity: usize) -> (AssetRecord, TransactionLedger) {
        let record = AssetRecord {
            symbol: self.symbol,
            name: self.name,
            quantity: self.quantity,
            history: PriceHistory::from_points(capacity, self.history),
        };
        (
            record,
            TransactionLedger::with_pending(self.thistory, self.pending),
        )
    }
}

/// One asset line in the aggregate snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub value: Decimal,
    /// Fraction of total value (0..=1)
    pub percent: Decimal,
    /// Percent change across the retained history
    pub rate_of_return: Decimal,
}

/// Aggregate registry snapshot for external consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub updated_at: DateTime<Utc>,
    pub total_value: Decimal,
    pub assets: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn from_registry(registry: &AssetRegistry, updated_at: DateTime<Utc>) -> Self {
        let percents = registry.percents();
        let assets = registry
            .iter()
            .map(|a| SnapshotEntry {
                symbol: a.symbol.clone(),
                quantity: a.quantity,
                price: a.current_price(),
                value: a.value(),
                percent: percents.get(&a.symbol).copied().unwrap_or(Decimal::ZERO),
                rate_of_return: a.rate_of_return(),
            })
            .collect();

        Self {
            name: registry.name().to_string(),
            updated_at,
            total_value: registry.total_value(),
            assets,
        }
    }
}
