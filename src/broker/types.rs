//! Broker types

use crate::asset::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broker call failures
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Transport failure (connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(String),
    /// Non-2xx response
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    /// Body missing expected keys or with the wrong types
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Order refused before reaching the market
    #[error("order rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for BrokerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BrokerError::Malformed(e.to_string())
        } else {
            BrokerError::Network(e.to_string())
        }
    }
}

/// A live account position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: String,
    /// Brokerage asset identifier
    pub asset_id: String,
    pub quantity: Decimal,
    pub current_price: Decimal,
}

/// A listed brokerage asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub symbol: String,
    pub name: String,
    pub tradable: bool,
    /// Whether notional (fractional) orders are accepted
    pub fractionable: bool,
}

/// A notional-sized order the strategy wants placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    /// Dollar amount to trade
    pub notional: Decimal,
}

impl OrderIntent {
    pub fn new(symbol: impl Into<String>, side: Side, notional: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            notional,
        }
    }

    pub fn buy(symbol: impl Into<String>, notional: Decimal) -> Self {
        Self::new(symbol, Side::Buy, notional)
    }

    pub fn sell(symbol: impl Into<String>, notional: Decimal) -> Self {
        Self::new(symbol, Side::Sell, notional)
    }
}

/// Broker acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReceipt {
    pub id: String,
    /// Quantity filled so far (zero if the order is still pending)
    pub filled_quantity: Decimal,
    /// Dollar value filled so far
    pub filled_value: Decimal,
}

impl OrderReceipt {
    /// Average fill price, if anything filled
    pub fn fill_price(&self) -> Option<Decimal> {
        if self.filled_quantity > Decimal::ZERO && self.filled_value > Decimal::ZERO {
            Some(self.filled_value / self.filled_quantity)
        } else {
            None
        }
    }
}
