//! Run command implementation

use crate::broker::AlpacaClient;
use crate::config::Config;
use crate::strategy;
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run a single tick and exit
    #[arg(long)]
    pub once: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let credentials = config.api.credentials()?;
        let broker = AlpacaClient::new(&config.api, credentials)?;
        let mut strategy = strategy::from_config(config, broker)?;

        tracing::info!(
            strategy = strategy.name(),
            kind = %config.strategy.kind,
            work_dir = %config.strategy.work_dir.display(),
            "Strategy initialized"
        );

        if self.once {
            if strategy::run_tick(strategy.as_mut()).await.is_none() {
                anyhow::bail!("tick failed");
            }
            return Ok(());
        }

        strategy::run_loop(
            strategy.as_mut(),
            Duration::from_secs(config.strategy.tick_secs),
        )
        .await;
        Ok(())
    }
}
