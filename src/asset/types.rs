//! Asset value types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Order side for fills and intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy into the asset
    Buy,
    /// Sell out of the asset
    Sell,
}

impl Side {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A single observed price at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Observed price
    pub price: Decimal,
    /// Observation time
    pub timestamp: DateTime<Utc>,
}

impl PricePoint {
    /// Create a new price point
    pub fn new(price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self { price, timestamp }
    }
}

/// An executed fill recorded in a transaction ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Fill price and time
    #[serde(flatten)]
    pub point: PricePoint,
    /// Filled quantity
    pub quantity: Decimal,
    /// Fill side
    pub side: Side,
}

impl LedgerEntry {
    /// Create a new ledger entry
    pub fn new(side: Side, price: Decimal, quantity: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            point: PricePoint::new(price, timestamp),
            quantity,
            side,
        }
    }

    /// Fill price
    pub fn price(&self) -> Decimal {
        self.point.price
    }

    /// Fill time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.point.timestamp
    }
}

/// An accepted order whose fill price is not known yet
///
/// Settled into a [`LedgerEntry`] once a price for the asset is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFill {
    /// Brokerage order id
    pub order_id: String,
    pub side: Side,
    /// Dollar amount ordered
    pub notional: Decimal,
    /// Submission time, used as the fill time on settlement
    pub submitted_at: DateTime<Utc>,
}

impl PendingFill {
    /// Resolve into a ledger entry at `price`, `None` unless `price` is positive
    pub fn settle(&self, price: Decimal) -> Option<LedgerEntry> {
        if price <= Decimal::ZERO {
            return None;
        }
        Some(LedgerEntry::new(
            self.side,
            price,
            self.notional / price,
            self.submitted_at,
        ))
    }
}

/// Rejected append: the point is not newer than the latest stored sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stale price point at {attempted} (latest is {latest})")]
pub struct OrderingViolation {
    /// Timestamp of the rejected point
    pub attempted: DateTime<Utc>,
    /// Timestamp of the latest stored point
    pub latest: DateTime<Utc>,
}
