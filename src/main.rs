use clap::Parser;
use tick_trader::cli::{Cli, Commands};
use tick_trader::config::{Config, StrategyKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("Could not load config from {}: {}", cli.config, e))?;

    // Initialize telemetry
    tick_trader::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(kind = %config.strategy.kind, "Starting strategy");
            args.execute(&config).await?;
        }
        Commands::Status(args) => {
            args.execute(&config).await?;
        }
        Commands::Assets(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  API: {}", config.api.base_url);
            println!(
                "  Strategy: {} every {}s in {}",
                config.strategy.kind,
                config.strategy.tick_secs,
                config.strategy.work_dir.display()
            );
            println!("  History length: {}", config.assets.history_length);
            match config.strategy.kind {
                StrategyKind::Threshold => {
                    if let Some(t) = &config.threshold {
                        println!(
                            "  Threshold: buy {} @ -{}, sell {} @ +{}, cooldown {}s",
                            t.base_buy,
                            t.thresh_buy,
                            t.base_sell.unwrap_or(t.base_buy),
                            t.thresh_sell,
                            t.order_cooldown_secs
                        );
                        println!("  Symbols: {}", t.symbols.join(", "));
                    }
                }
                StrategyKind::Allocation => {
                    if let Some(a) = &config.allocation {
                        println!(
                            "  Allocation: basis {:?}, cooldown {}s",
                            a.target_basis, a.order_cooldown_secs
                        );
                        if a.targets.is_empty() {
                            println!("  Targets: equal split of owned assets");
                        }
                        for (symbol, pct) in &a.targets {
                            println!("  Target {}: {}%", symbol, pct);
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
