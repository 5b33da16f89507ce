/// Operator batch job: reconcile listings, refresh market data, aggregate sectors
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nsepulse::config::load_config;
use nsepulse::error::Result;
use nsepulse::provider::{QuoteSource, YahooClient};
use nsepulse::sector::SectorAggregator;
use nsepulse::store::{SectorStore, StockStore};
use nsepulse::sync::{ListingSynchronizer, RefreshOrchestrator};
use nsepulse::types::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let config = load_config(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("🚀 NSE Market-Data Update Job");
    info!("=============================");

    match run(&config).await {
        Ok(()) => {
            info!("✅ Stock update completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("❌ Stock update failed: {} ({})", e, e.error_code());
            Err(e.into())
        }
    }
}

async fn run(config: &Config) -> Result<()> {
    let data_dir = PathBuf::from(&config.data_dir);

    let stock_store = Arc::new(StockStore::new(data_dir.join("stocks.json")));
    let sector_store = Arc::new(SectorStore::new(data_dir.join("sectors.json")));

    let loaded_stocks = stock_store.load().await?;
    let loaded_sectors = sector_store.load().await?;
    info!(
        "📂 Loaded {} stocks and {} sector summaries from {}",
        loaded_stocks,
        loaded_sectors,
        data_dir.display()
    );

    let client: Arc<dyn QuoteSource> = Arc::new(YahooClient::new(config)?);
    let synchronizer = ListingSynchronizer::new(config, Arc::clone(&stock_store))?;
    let orchestrator =
        RefreshOrchestrator::new(config, client, Arc::clone(&stock_store));
    let aggregator = SectorAggregator::new(
        config.min_sector_stocks,
        config.top_sectors_count,
        config.proxy_weight_multiplier,
    );

    // Phase 1: reconcile the symbol universe against the NSE listing.
    // A listing failure aborts the run - nothing to refresh without it.
    info!("");
    info!("📋 Phase 1/3: Updating NSE listings...");
    synchronizer.reconcile().await?;
    stock_store.save().await?;

    // Phase 2: concurrent per-symbol market-data refresh
    info!("");
    info!("📈 Phase 2/3: Updating market data...");
    let symbols = stock_store.symbols().await;
    let report = orchestrator.refresh_all(symbols).await;
    stock_store.save().await?;

    // Phase 3: sector aggregation over the rows the refresh just wrote
    info!("");
    info!("📊 Phase 3/3: Calculating sector performance...");
    let summaries = aggregator.publish(&stock_store, &sector_store).await?;

    info!("");
    info!("=============================");
    info!("📋 Run summary:");
    info!("   Symbols in universe: {}", report.total_symbols);
    info!(
        "   Refreshed: {} ({:.1}%), skipped: {}, failed: {}",
        report.updated,
        report.success_rate(),
        report.skipped,
        report.failed
    );
    info!("   Top sectors published: {}", summaries.len());

    Ok(())
}
