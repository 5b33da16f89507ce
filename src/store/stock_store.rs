/// Persisted stock table: in-memory map + JSON snapshot on disk
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::types::{Quote, Stock};

/// Shared stock table keyed by symbol.
///
/// The listing synchronizer owns identity and sector assignment; the
/// refresh orchestrator mutates only the market-data fields. Each worker
/// touches a disjoint symbol, so row updates never contend.
pub struct StockStore {
    stocks: RwLock<HashMap<String, Stock>>,
    disk_file: PathBuf,
}

impl StockStore {
    pub fn new(disk_file: PathBuf) -> Self {
        StockStore {
            stocks: RwLock::new(HashMap::new()),
            disk_file,
        }
    }

    /// Load the snapshot from disk; missing file is an empty store
    pub async fn load(&self) -> Result<usize> {
        if !self.disk_file.exists() {
            debug!("No existing stock snapshot at {}", self.disk_file.display());
            return Ok(0);
        }

        let body = tokio::fs::read_to_string(&self.disk_file).await?;
        let rows: Vec<Stock> = serde_json::from_str(&body)?;
        let count = rows.len();

        let mut stocks = self.stocks.write().await;
        *stocks = rows.into_iter().map(|s| (s.symbol.clone(), s)).collect();

        debug!("Loaded {} stocks from {}", count, self.disk_file.display());
        Ok(count)
    }

    /// Write the full snapshot to disk, ordered by symbol
    pub async fn save(&self) -> Result<()> {
        let json = {
            let stocks = self.stocks.read().await;
            let mut rows: Vec<&Stock> = stocks.values().collect();
            rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            serde_json::to_string_pretty(&rows)?
        };

        if let Some(parent) = self.disk_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.disk_file, json).await?;
        Ok(())
    }

    /// Upsert a stock from the listing. New symbols get zeroed price
    /// fields; existing symbols keep their market data and only refresh
    /// name and sector. Returns true when a new row was created.
    pub async fn upsert_listing(&self, symbol: &str, name: &str, sector: &str) -> bool {
        let mut stocks = self.stocks.write().await;

        match stocks.get_mut(symbol) {
            Some(stock) => {
                stock.name = name.to_string();
                stock.sector = Some(sector.to_string());
                stock.last_updated = Utc::now();
                false
            }
            None => {
                stocks.insert(
                    symbol.to_string(),
                    Stock::new_listing(symbol.to_string(), name.to_string(), sector.to_string()),
                );
                true
            }
        }
    }

    /// Apply a refreshed quote to one symbol's market-data fields.
    ///
    /// Absent fundamentals keep their previous values rather than being
    /// nulled out, matching the provider's sparse coverage of newly
    /// listed symbols.
    pub async fn apply_quote(&self, symbol: &str, quote: &Quote, change_pct: f64) -> bool {
        let mut stocks = self.stocks.write().await;

        match stocks.get_mut(symbol) {
            Some(stock) => {
                stock.current_price = quote.current_price;
                stock.high_52w = quote.high_52w;
                stock.low_52w = quote.low_52w;
                if let Some(cap) = quote.market_cap {
                    stock.market_cap = cap;
                }
                if quote.pe_ratio.is_some() {
                    stock.pe_ratio = quote.pe_ratio;
                }
                stock.change_percentage = Some(change_pct);
                stock.last_updated = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Delete every stock whose symbol is absent from the reference set.
    /// Returns the removed symbols.
    pub async fn remove_absent(&self, keep: &HashSet<String>) -> Vec<String> {
        let mut stocks = self.stocks.write().await;

        let removed: Vec<String> = stocks
            .keys()
            .filter(|symbol| !keep.contains(*symbol))
            .cloned()
            .collect();

        for symbol in &removed {
            stocks.remove(symbol);
        }

        removed
    }

    pub async fn get(&self, symbol: &str) -> Option<Stock> {
        let stocks = self.stocks.read().await;
        stocks.get(symbol).cloned()
    }

    pub async fn all(&self) -> Vec<Stock> {
        let stocks = self.stocks.read().await;
        stocks.values().cloned().collect()
    }

    /// All symbols, sorted for deterministic batch order
    pub async fn symbols(&self) -> Vec<String> {
        let stocks = self.stocks.read().await;
        let mut symbols: Vec<String> = stocks.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub async fn len(&self) -> usize {
        let stocks = self.stocks.read().await;
        stocks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
