//! Status command implementation

use crate::config::Config;
use crate::store::{Snapshot, StateStore};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Read state from this directory instead of the configured work dir
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

impl StatusArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let dir = self
            .work_dir
            .clone()
            .unwrap_or_else(|| config.strategy.work_dir.clone());
        let store = StateStore::open(&dir)?;

        match store.load_snapshot()? {
            Some(snapshot) => print!("{}", render(&snapshot)),
            None => println!("No snapshot in {} yet", dir.display()),
        }
        if let Some(at) = store.load_last_order_time()? {
            println!("Last order: {}", at.to_rfc3339());
        }
        Ok(())
    }
}

fn render(snapshot: &Snapshot) -> String {
    let mut out = format!(
        "{} (updated {})\n",
        snapshot.name,
        snapshot.updated_at.to_rfc3339()
    );
    out.push_str(&format!(
        "  {:<8} {:>12} {:>14} {:>12} {:>8} {:>12}\n",
        "SYMBOL", "PRICE", "QUANTITY", "VALUE", "PCT", "ROR"
    ));
    for asset in &snapshot.assets {
        let price = asset
            .price
            .map(|p| p.round_dp(2).to_string())
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  {:<8} {:>12} {:>14} {:>12} {:>7}% {:>11}%\n",
            asset.symbol,
            price,
            asset.quantity.round_dp(6),
            asset.value.round_dp(2),
            (asset.percent * Decimal::ONE_HUNDRED).round_dp(2),
            asset.rate_of_return,
        ));
    }
    out.push_str(&format!("  Total value: {}\n", snapshot.total_value.round_dp(2)));
    out
}
