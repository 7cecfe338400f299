//! Alpaca REST client
//!
//! Covers the three calls the strategies need: the market clock, account
//! positions and notional market orders. Also lists assets so symbols can be
//! checked for fractional trading.

use super::{AssetInfo, BrokerError, OrderIntent, OrderReceipt, Position, TradingApi};
use crate::config::{ApiConfig, Credentials};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HEADER_KEY_ID: &str = "APCA-API-KEY-ID";
const HEADER_SECRET_KEY: &str = "APCA-API-SECRET-KEY";

/// Client for Alpaca's trading API
pub struct AlpacaClient {
    base_url: String,
    credentials: Credentials,
    client: Client,
}

impl AlpacaClient {
    /// Create a client from API config and resolved credentials
    pub fn new(config: &ApiConfig, credentials: Credentials) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(HEADER_KEY_ID, &self.credentials.key_id)
            .header(HEADER_SECRET_KEY, &self.credentials.secret_key)
    }

    /// All assets listed by the brokerage
    pub async fn assets(&self) -> Result<Vec<AssetInfo>, BrokerError> {
        let url = self.url("/v2/assets");
        tracing::debug!(url = %url, "Fetching assets");

        let response = self.authed(self.client.get(&url)).send().await?;
        let body = Self::check(response).await?.text().await?;
        parse_assets(&body)
    }

    async fn check(response: Response) -> Result<Response, BrokerError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BrokerError::Status { status, body })
    }
}

#[async_trait]
impl TradingApi for AlpacaClient {
    async fn market_open(&self) -> Result<bool, BrokerError> {
        let url = self.url("/v2/clock");
        tracing::debug!(url = %url, "Fetching market clock");

        let response = self.authed(self.client.get(&url)).send().await?;
        let clock: ClockResponse = Self::check(response).await?.json().await?;
        Ok(clock.is_open)
    }

    async fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let url = self.url("/v2/positions");
        tracing::debug!(url = %url, "Fetching positions");

        let response = self.authed(self.client.get(&url)).send().await?;
        let body = Self::check(response).await?.text().await?;
        parse_positions(&body)
    }

    async fn submit_order(&self, order: &OrderIntent) -> Result<OrderReceipt, BrokerError> {
        let notional = order.notional.round_dp(2);
        if notional <= Decimal::ZERO {
            return Err(BrokerError::Rejected(format!(
                "notional {} rounds to zero",
                order.notional
            )));
        }

        let request = OrderRequest {
            symbol: &order.symbol,
            notional: notional.to_string(),
            side: order.side.as_str(),
            order_type: "market",
            time_in_force: "day",
        };

        let url = self.url("/v2/orders");
        tracing::debug!(url = %url, symbol = %order.symbol, side = %order.side, %notional, "Submitting order");

        let response = self
            .authed(self.client.post(&url))
            .json(&request)
            .send()
            .await?;
        let body = Self::check(response).await?.text().await?;
        parse_order(&body)
    }
}

/// Parse a `/v2/positions` response body
pub fn parse_positions(body: &str) -> Result<Vec<Position>, BrokerError> {
    let raw: Vec<PositionResponse> =
        serde_json::from_str(body).map_err(|e| BrokerError::Malformed(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|p| Position {
            symbol: p.symbol,
            asset_id: p.asset_id,
            quantity: p.qty,
            current_price: p.current_price,
        })
        .collect())
}

/// Parse a `/v2/assets` response body
pub fn parse_assets(body: &str) -> Result<Vec<AssetInfo>, BrokerError> {
    let raw: Vec<AssetResponse> =
        serde_json::from_str(body).map_err(|e| BrokerError::Malformed(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|a| AssetInfo {
            symbol: a.symbol,
            name: a.name,
            tradable: a.tradable,
            fractionable: a.fractionable,
        })
        .collect())
}

/// Parse a `/v2/orders` response body
pub fn parse_order(body: &str) -> Result<OrderReceipt, BrokerError> {
    let raw: OrderResponse =
        serde_json::from_str(body).map_err(|e| BrokerError::Malformed(e.to_string()))?;

    let filled_quantity = raw.filled_qty.unwrap_or(Decimal::ZERO);
    let filled_value = raw
        .filled_avg_price
        .map(|avg| avg * filled_quantity)
        .unwrap_or(Decimal::ZERO);

    Ok(OrderReceipt {
        id: raw.id,
        filled_quantity,
        filled_value,
    })
}

#[derive(Debug, Deserialize)]
struct ClockResponse {
    is_open: bool,
}

/// Alpaca sends numeric fields as strings; `Decimal` accepts both
#[derive(Debug, Deserialize)]
struct PositionResponse {
    asset_id: String,
    symbol: String,
    qty: Decimal,
    current_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tradable: bool,
    fractionable: bool,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    filled_qty: Option<Decimal>,
    #[serde(default)]
    filled_avg_price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    symbol: &'a str,
    notional: String,
    side: &'static str,
    #[serde(rename = "type")]
    order_type: &'static str,
    time_in_force: &'static str,
}
