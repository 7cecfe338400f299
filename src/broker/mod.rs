//! Brokerage access
//!
//! Market status, position queries and order submission (Alpaca and paper)

mod alpaca;
mod paper;
mod types;

pub use alpaca::{parse_assets, parse_order, parse_positions, AlpacaClient};
pub use paper::PaperBroker;
pub use types::{AssetInfo, BrokerError, OrderIntent, OrderReceipt, Position};

use async_trait::async_trait;

/// Trait for trading API implementations
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Whether the market is currently open
    async fn market_open(&self) -> Result<bool, BrokerError>;
    /// All open account positions
    async fn positions(&self) -> Result<Vec<Position>, BrokerError>;
    /// Submit a notional market order
    async fn submit_order(&self, order: &OrderIntent) -> Result<OrderReceipt, BrokerError>;
}
