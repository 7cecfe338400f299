//! Paper trading broker with simulated fills

use super::{BrokerError, OrderIntent, OrderReceipt, Position, TradingApi};
use crate::asset::Side;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct PaperAccount {
    market_open: bool,
    offline: bool,
    positions_unavailable: bool,
    /// Fill orders but acknowledge them with an empty receipt
    pending_receipts: bool,
    /// symbol -> (quantity, mark price)
    holdings: BTreeMap<String, (Decimal, Decimal)>,
    rejected_symbols: HashSet<String>,
    orders: Vec<OrderIntent>,
}

/// In-memory account that fills every order immediately at the mark price
#[derive(Clone)]
pub struct PaperBroker {
    account: Arc<RwLock<PaperAccount>>,
}

impl PaperBroker {
    /// Create an empty account with the market open
    pub fn new() -> Self {
        Self {
            account: Arc::new(RwLock::new(PaperAccount {
                market_open: true,
                ..PaperAccount::default()
            })),
        }
    }

    /// Set the quantity and mark price held for a symbol
    pub async fn set_holding(&self, symbol: &str, quantity: Decimal, price: Decimal) {
        let mut account = self.account.write().await;
        account.holdings.insert(symbol.to_string(), (quantity, price));
    }

    /// Move the mark price for a symbol, keeping its quantity
    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        let mut account = self.account.write().await;
        let entry = account
            .holdings
            .entry(symbol.to_string())
            .or_insert((Decimal::ZERO, price));
        entry.1 = price;
    }

    pub async fn set_market_open(&self, open: bool) {
        self.account.write().await.market_open = open;
    }

    /// Make every call fail with a network error
    pub async fn set_offline(&self, offline: bool) {
        self.account.write().await.offline = offline;
    }

    /// Make position queries fail while the clock keeps answering
    pub async fn set_positions_unavailable(&self, unavailable: bool) {
        self.account.write().await.positions_unavailable = unavailable;
    }

    /// Acknowledge orders without fill details, as a broker does for an
    /// order still working when the receipt is returned
    ///
    /// The account is still updated as if the order filled at the mark.
    pub async fn set_pending(&self, pending: bool) {
        self.account.write().await.pending_receipts = pending;
    }

    /// Reject orders for a symbol
    pub async fn reject_orders_for(&self, symbol: &str) {
        self.account
            .write()
            .await
            .rejected_symbols
            .insert(symbol.to_string());
    }

    /// Quantity currently held
    pub async fn quantity(&self, symbol: &str) -> Decimal {
        self.account
            .read()
            .await
            .holdings
            .get(symbol)
            .map(|(q, _)| *q)
            .unwrap_or(Decimal::ZERO)
    }

    /// Orders filled so far, in submission order
    pub async fn orders(&self) -> Vec<OrderIntent> {
        self.account.read().await.orders.clone()
    }

    async fn ensure_online(&self) -> Result<(), BrokerError> {
        if self.account.read().await.offline {
            return Err(BrokerError::Network("paper broker offline".to_string()));
        }
        Ok(())
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradingApi for PaperBroker {
    async fn market_open(&self) -> Result<bool, BrokerError> {
        self.ensure_online().await?;
        Ok(self.account.read().await.market_open)
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        self.ensure_online().await?;
        let account = self.account.read().await;
        if account.positions_unavailable {
            return Err(BrokerError::Status {
                status: 503,
                body: "positions unavailable".to_string(),
            });
        }
        Ok(account
            .holdings
            .iter()
            .filter(|(_, (quantity, _))| *quantity > Decimal::ZERO)
            .map(|(symbol, (quantity, price))| Position {
                symbol: symbol.clone(),
                asset_id: format!("paper-{}", symbol.to_lowercase()),
                quantity: *quantity,
                current_price: *price,
            })
            .collect())
    }

    async fn submit_order(&self, order: &OrderIntent) -> Result<OrderReceipt, BrokerError> {
        self.ensure_online().await?;
        let mut account = self.account.write().await;

        if account.rejected_symbols.contains(&order.symbol) {
            return Err(BrokerError::Rejected(format!("{} is not tradable", order.symbol)));
        }

        let (held, price) = account
            .holdings
            .get(&order.symbol)
            .copied()
            .ok_or_else(|| BrokerError::Rejected(format!("no price for {}", order.symbol)))?;
        if price <= Decimal::ZERO {
            return Err(BrokerError::Rejected(format!("no price for {}", order.symbol)));
        }

        let quantity = order.notional / price;
        let remaining = match order.side {
            Side::Buy => held + quantity,
            Side::Sell if quantity <= held => held - quantity,
            Side::Sell => {
                return Err(BrokerError::Rejected(format!(
                    "insufficient quantity of {}",
                    order.symbol
                )))
            }
        };
        account.holdings.insert(order.symbol.clone(), (remaining, price));
        account.orders.push(order.clone());

        let id = Uuid::new_v4().to_string();
        tracing::info!(%id, symbol = %order.symbol, side = %order.side, notional = %order.notional, "Paper order filled");

        if account.pending_receipts {
            return Ok(OrderReceipt {
                id,
                filled_quantity: Decimal::ZERO,
                filled_value: Decimal::ZERO,
            });
        }
        Ok(OrderReceipt {
            id,
            filled_quantity: quantity,
            filled_value: order.notional,
        })
    }
}
