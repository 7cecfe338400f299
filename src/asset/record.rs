//! Per-asset record: identity, quantity and price history

use super::history::PriceHistory;
use super::types::{OrderingViolation, PricePoint};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Stand-in for a zero starting price when computing rate of return
const ZERO_PRICE_GUARD: Decimal = dec!(0.00001);

/// Simple rate of return in percent, rounded to 4 decimal places
///
/// A `begin` of exactly zero is replaced by `0.00001`.
pub fn rate_of_return(begin: Decimal, end: Decimal) -> Decimal {
    let begin = if begin.is_zero() { ZERO_PRICE_GUARD } else { begin };
    ((end - begin) / begin * dec!(100)).round_dp(4)
}

/// A tracked asset
#[derive(Debug, Clone)]
pub struct AssetRecord {
    /// Market symbol, uppercase by convention
    pub symbol: String,
    /// Display name (the brokerage asset id when fetched from the API)
    pub name: String,
    /// Quantity owned
    pub quantity: Decimal,
    /// Observed prices
    pub history: PriceHistory,
}

impl AssetRecord {
    /// Create a record with an empty history
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        quantity: Decimal,
        capacity: usize,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            quantity,
            history: PriceHistory::new(capacity),
        }
    }

    /// Record an observed or filled price
    pub fn record_price(&mut self, point: PricePoint) -> Result<(), OrderingViolation> {
        self.history.append(point)
    }

    /// Most recent price, if any
    pub fn current_price(&self) -> Option<Decimal> {
        self.history.latest().map(|p| p.price)
    }

    /// Market value at the latest observed price
    pub fn value(&self) -> Decimal {
        self.current_price()
            .map(|price| price * self.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// Percent change from the earliest to the latest retained price
    pub fn rate_of_return(&self) -> Decimal {
        match (self.history.earliest(), self.history.latest()) {
            (Some(first), Some(last)) => rate_of_return(first.price, last.price),
            _ => Decimal::ZERO,
        }
    }

    /// Whether any quantity is held
    pub fn is_owned(&self) -> bool {
        self.quantity > Decimal::ZERO
    }
}

impl PartialEq for AssetRecord {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for AssetRecord {}
