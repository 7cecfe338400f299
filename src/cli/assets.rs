//! Assets command implementation

use crate::broker::{AlpacaClient, AssetInfo};
use crate::config::Config;
use clap::Args;
use std::collections::BTreeSet;

#[derive(Args, Debug)]
pub struct AssetsArgs {
    /// Only list assets that accept fractional (notional) orders
    #[arg(long)]
    pub fractionable: bool,

    /// Only list symbols named in the configuration
    #[arg(long)]
    pub configured: bool,
}

impl AssetsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let credentials = config.api.credentials()?;
        let client = AlpacaClient::new(&config.api, credentials)?;
        let assets = client.assets().await?;
        tracing::debug!(count = assets.len(), "Fetched asset list");

        let wanted = self.configured.then(|| configured_symbols(config));
        for asset in select(&assets, self.fractionable, wanted.as_ref()) {
            println!(
                "{:<8} {:<12} {}",
                asset.symbol,
                if asset.fractionable { "fractionable" } else { "whole" },
                asset.name
            );
        }

        if let Some(wanted) = &wanted {
            for symbol in missing(&assets, wanted) {
                eprintln!("{}: not listed by the brokerage", symbol);
            }
        }
        Ok(())
    }
}

/// Symbols the threshold list and allocation targets refer to
fn configured_symbols(config: &Config) -> BTreeSet<String> {
    let mut symbols = BTreeSet::new();
    if let Some(t) = &config.threshold {
        symbols.extend(t.symbols.iter().cloned());
    }
    if let Some(a) = &config.allocation {
        symbols.extend(a.targets.keys().cloned());
    }
    symbols
}

/// Tradable assets passing the filters, in listing order
fn select<'a>(
    assets: &'a [AssetInfo],
    fractionable_only: bool,
    symbols: Option<&BTreeSet<String>>,
) -> Vec<&'a AssetInfo> {
    assets
        .iter()
        .filter(|a| a.tradable)
        .filter(|a| !fractionable_only || a.fractionable)
        .filter(|a| symbols.map_or(true, |s| s.contains(&a.symbol)))
        .collect()
}

fn missing<'a>(assets: &[AssetInfo], symbols: &'a BTreeSet<String>) -> Vec<&'a str> {
    symbols
        .iter()
        .filter(|s| !assets.iter().any(|a| &a.symbol == *s))
        .map(String::as_str)
        .collect()
}
