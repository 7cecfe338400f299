//! CLI interface for tick-trader
//!
//! Provides subcommands for:
//! - `run`: Start the configured strategy
//! - `status`: Show the persisted portfolio snapshot
//! - `assets`: List brokerage assets, optionally only fractionable ones
//! - `config`: Show the effective configuration

mod assets;
mod run;
mod status;

pub use assets::AssetsArgs;
pub use run::RunArgs;
pub use status::StatusArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tick-trader")]
#[command(about = "Periodic threshold and allocation trading bot for Alpaca accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the configured strategy
    Run(RunArgs),
    /// Show the persisted portfolio snapshot
    Status(StatusArgs),
    /// List brokerage assets
    Assets(AssetsArgs),
    /// Show configuration
    Config,
}
