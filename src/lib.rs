//! tick-trader: periodic trading bot for Alpaca-compatible brokerages
//!
//! This library provides the core components for:
//! - Bounded price histories and per-asset transaction ledgers
//! - Asset registry with value, percent and rate-of-return queries
//! - Threshold and target-allocation decision engines
//! - Brokerage access (Alpaca REST and an in-memory paper account)
//! - JSON state documents and CSV value logs
//! - Logging and Prometheus metrics

pub mod asset;
pub mod broker;
pub mod cli;
pub mod config;
pub mod store;
pub mod strategy;
pub mod telemetry;
