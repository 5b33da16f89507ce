/// Concurrent per-symbol market-data refresh
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::provider::QuoteSource;
use crate::store::StockStore;
use crate::types::{Config, Quote};

/// Summary of one refresh batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshReport {
    pub timestamp: chrono::DateTime<Utc>,
    pub duration_sec: i64,
    pub total_symbols: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RefreshReport {
    pub fn success_rate(&self) -> f64 {
        if self.total_symbols == 0 {
            return 0.0;
        }
        (self.updated as f64 / self.total_symbols as f64) * 100.0
    }
}

enum SymbolOutcome {
    Updated,
    Skipped,
    Failed,
}

/// Fans per-symbol fetches out over a bounded worker pool.
///
/// Each task acquires a semaphore permit, fetches, applies its update and
/// keeps the permit through a fixed inter-request delay, so the pool's
/// aggregate request rate stays bounded regardless of batch size.
pub struct RefreshOrchestrator {
    source: Arc<dyn QuoteSource>,
    store: Arc<StockStore>,
    workers: usize,
    inter_request_delay_ms: u64,
}

impl RefreshOrchestrator {
    pub fn new(config: &Config, source: Arc<dyn QuoteSource>, store: Arc<StockStore>) -> Self {
        RefreshOrchestrator {
            source,
            store,
            workers: config.refresh_workers,
            inter_request_delay_ms: config.inter_request_delay_ms,
        }
    }

    /// Refresh every symbol in the batch. Per-symbol failures are counted
    /// and logged, never propagated - one bad symbol must not sink the
    /// rest of the batch.
    pub async fn refresh_all(&self, symbols: Vec<String>) -> RefreshReport {
        let start_time = Utc::now();
        let total_symbols = symbols.len();

        info!(
            "🔄 Refreshing {} symbols ({} workers, {}ms inter-request delay)",
            total_symbols, self.workers, self.inter_request_delay_ms
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut join_set: JoinSet<(String, SymbolOutcome)> = JoinSet::new();

        for symbol in symbols {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let store = Arc::clone(&self.store);
            let delay_ms = self.inter_request_delay_ms;

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("refresh semaphore closed");

                let outcome = refresh_symbol(&*source, &store, &symbol).await;

                // Hold the permit through the delay to pace the pool
                if delay_ms > 0 {
                    sleep(Duration::from_millis(delay_ms)).await;
                }

                (symbol, outcome)
            });
        }

        let mut updated = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;
        let mut processed = 0usize;

        while let Some(joined) = join_set.join_next().await {
            processed += 1;
            match joined {
                Ok((_, SymbolOutcome::Updated)) => updated += 1,
                Ok((_, SymbolOutcome::Skipped)) => skipped += 1,
                Ok((_, SymbolOutcome::Failed)) => failed += 1,
                Err(e) => {
                    error!("Refresh task panicked: {}", e);
                    failed += 1;
                }
            }

            if processed % 100 == 0 || processed == total_symbols {
                info!(
                    "   [{}/{}] updated: {}, skipped: {}, failed: {}",
                    processed, total_symbols, updated, skipped, failed
                );
            }
        }

        let end_time = Utc::now();
        let report = RefreshReport {
            timestamp: end_time,
            duration_sec: (end_time - start_time).num_seconds(),
            total_symbols,
            updated,
            skipped,
            failed,
        };

        info!(
            "✅ Refresh complete in {}s: {}/{} updated ({:.1}%), {} skipped, {} failed",
            report.duration_sec,
            report.updated,
            report.total_symbols,
            report.success_rate(),
            report.skipped,
            report.failed
        );

        report
    }
}

/// Fetch and apply one symbol's update
async fn refresh_symbol(
    source: &dyn QuoteSource,
    store: &StockStore,
    symbol: &str,
) -> SymbolOutcome {
    match source.fetch_quote(symbol).await {
        Ok(Some(quote)) => apply_symbol_update(store, symbol, &quote).await,
        Ok(None) => {
            debug!("{}: delisted or missing data, skipping", symbol);
            SymbolOutcome::Skipped
        }
        Err(e) => {
            warn!("Failed to refresh {}: {} ({})", symbol, e, e.error_code());
            SymbolOutcome::Failed
        }
    }
}

async fn apply_symbol_update(store: &StockStore, symbol: &str, quote: &Quote) -> SymbolOutcome {
    if quote.current_price <= 0.0 {
        debug!("{}: no usable price, skipping", symbol);
        return SymbolOutcome::Skipped;
    }

    let change_pct = change_percentage(quote.current_price, quote.previous_close);

    if store.apply_quote(symbol, quote, change_pct).await {
        debug!(
            "{}: price {:.2}, change {:.2}%",
            symbol, quote.current_price, change_pct
        );
        SymbolOutcome::Updated
    } else {
        // Symbol vanished between reconcile and refresh
        debug!("{}: not in store, skipping", symbol);
        SymbolOutcome::Skipped
    }
}

/// Change since previous close, guarded against division by zero
pub fn change_percentage(current: f64, previous_close: f64) -> f64 {
    if previous_close <= 0.0 {
        return 0.0;
    }
    (current - previous_close) / previous_close * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MarketError, Result};
    use crate::provider::QuoteSource;
    use crate::types::SectorKeyword;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Scripted quote source: per-symbol canned outcomes
    struct ScriptedSource {
        quotes: HashMap<String, Option<Quote>>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>> {
            if self.failing.contains(&symbol.to_string()) {
                return Err(MarketError::ProviderError {
                    code: 500,
                    message: format!("scripted failure for {}", symbol),
                });
            }
            Ok(self.quotes.get(symbol).cloned().flatten())
        }
    }

    fn test_config(workers: usize) -> Config {
        Config {
            request_timeout_sec: 5,
            max_retries: 1,
            retry_backoff_floor_sec: 1,
            retry_backoff_ceiling_sec: 1,
            symbol_suffix: ".NS".to_string(),
            refresh_workers: workers,
            inter_request_delay_ms: 0,
            listing_url: "https://example.invalid/EQUITY_L.csv".to_string(),
            equity_series: "EQ".to_string(),
            min_sector_stocks: 2,
            top_sectors_count: 5,
            proxy_weight_multiplier: 1_000_000.0,
            sector_keywords: vec![SectorKeyword {
                keyword: "BANK".to_string(),
                sector: "Financial Services".to_string(),
            }],
            data_dir: "data".to_string(),
            log_level: "info".to_string(),
        }
    }

    fn quote(price: f64, prev_close: f64) -> Quote {
        Quote {
            current_price: price,
            previous_close: prev_close,
            high_52w: price * 1.2,
            low_52w: price * 0.8,
            market_cap: Some(1.0e9),
            pe_ratio: Some(15.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_change_percentage_guard() {
        assert_eq!(change_percentage(100.0, 0.0), 0.0);
        assert_eq!(change_percentage(100.0, -5.0), 0.0);
        assert!((change_percentage(110.0, 100.0) - 10.0).abs() < 1e-9);
        assert!((change_percentage(98.0, 100.0) + 2.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_batch_contains_per_symbol_failures() {
        let store = Arc::new(StockStore::new(
            std::env::temp_dir().join(PathBuf::from("test_refresh_batch.json")),
        ));
        for symbol in ["GOOD", "ZEROPRICE", "NODATA", "BROKEN"] {
            store.upsert_listing(symbol, "Test Ltd", "Other").await;
        }

        let mut quotes = HashMap::new();
        quotes.insert("GOOD".to_string(), Some(quote(150.0, 148.0)));
        quotes.insert("ZEROPRICE".to_string(), Some(quote(0.0, 100.0)));
        quotes.insert("NODATA".to_string(), None);

        let source = Arc::new(ScriptedSource {
            quotes,
            failing: vec!["BROKEN".to_string()],
        });

        let orchestrator =
            RefreshOrchestrator::new(&test_config(2), source, Arc::clone(&store));
        let report = orchestrator
            .refresh_all(vec![
                "GOOD".to_string(),
                "ZEROPRICE".to_string(),
                "NODATA".to_string(),
                "BROKEN".to_string(),
            ])
            .await;

        assert_eq!(report.total_symbols, 4);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 1);

        // Only the good symbol was touched
        let good = store.get("GOOD").await.unwrap();
        assert_eq!(good.current_price, 150.0);
        assert!(good.change_percentage.is_some());

        let zero = store.get("ZEROPRICE").await.unwrap();
        assert_eq!(zero.current_price, 0.0);
        assert_eq!(zero.change_percentage, None);
    }

    #[tokio::test]
    async fn test_refresh_applies_guarded_change() {
        let store = Arc::new(StockStore::new(
            std::env::temp_dir().join(PathBuf::from("test_refresh_guard.json")),
        ));
        store.upsert_listing("IPO", "Fresh Listing Ltd", "Other").await;

        let mut quotes = HashMap::new();
        // No previous close yet - change must compute to 0, not panic
        quotes.insert("IPO".to_string(), Some(quote(42.0, 0.0)));

        let source = Arc::new(ScriptedSource {
            quotes,
            failing: vec![],
        });

        let orchestrator =
            RefreshOrchestrator::new(&test_config(1), source, Arc::clone(&store));
        let report = orchestrator.refresh_all(vec!["IPO".to_string()]).await;

        assert_eq!(report.updated, 1);
        let stock = store.get("IPO").await.unwrap();
        assert_eq!(stock.change_percentage, Some(0.0));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let store = Arc::new(StockStore::new(
            std::env::temp_dir().join(PathBuf::from("test_refresh_empty.json")),
        ));
        let source = Arc::new(ScriptedSource {
            quotes: HashMap::new(),
            failing: vec![],
        });

        let orchestrator = RefreshOrchestrator::new(&test_config(1), source, store);
        let report = orchestrator.refresh_all(Vec::new()).await;

        assert_eq!(report.total_symbols, 0);
        assert_eq!(report.success_rate(), 0.0);
    }
}
