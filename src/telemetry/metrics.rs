//! Prometheus metrics

use crate::asset::{AssetRegistry, Side};
use ::metrics::{counter, gauge};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const TOTAL_VALUE: &str = "ticktrader_total_value_usd";
const ASSET_VALUE: &str = "ticktrader_asset_value_usd";
const ASSET_ROR: &str = "ticktrader_asset_ror_pct";
const ORDERS_SUBMITTED: &str = "ticktrader_orders_submitted_total";
const ORDERS_FAILED: &str = "ticktrader_orders_failed_total";
const TICKS: &str = "ticktrader_ticks_total";

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

/// Publish total and per-asset value gauges
pub fn record_portfolio(registry: &AssetRegistry) {
    gauge!(TOTAL_VALUE).set(as_f64(registry.total_value()));

    for asset in registry.iter() {
        gauge!(ASSET_VALUE, "symbol" => asset.symbol.clone()).set(as_f64(asset.value()));
        gauge!(ASSET_ROR, "symbol" => asset.symbol.clone()).set(as_f64(asset.rate_of_return()));
    }
}

/// Count a submitted or failed order
pub fn record_order(side: Side, succeeded: bool) {
    if succeeded {
        counter!(ORDERS_SUBMITTED, "side" => side.as_str()).increment(1);
    } else {
        counter!(ORDERS_FAILED).increment(1);
    }
}

/// Count a finished tick by outcome
pub fn record_tick(outcome: &'static str) {
    counter!(TICKS, "outcome" => outcome).increment(1);
}
