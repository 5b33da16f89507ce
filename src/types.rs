/// Core type definitions for the market-data pipeline
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single listed equity with its latest market data.
///
/// `symbol` is the stable identity. Price fields are zeroed and
/// `change_percentage` is `None` until the first successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub name: String,
    pub sector: Option<String>,
    pub current_price: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub market_cap: f64,
    pub pe_ratio: Option<f64>,
    pub change_percentage: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl Stock {
    /// New listing with safe defaults, pending its first refresh
    pub fn new_listing(symbol: String, name: String, sector: String) -> Self {
        Stock {
            symbol,
            name,
            sector: Some(sector),
            current_price: 0.0,
            high_52w: 0.0,
            low_52w: 0.0,
            market_cap: 0.0,
            pe_ratio: None,
            change_percentage: None,
            last_updated: Utc::now(),
        }
    }
}

/// Derived per-sector performance summary.
///
/// Fully recomputed and replaced on every aggregation run, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSummary {
    pub name: String,
    pub performance: f64,
    pub stocks_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Snapshot of provider data for one symbol
#[derive(Debug, Clone, Default)]
pub struct Quote {
    pub current_price: f64,
    pub previous_close: f64,
    pub high_52w: f64,
    pub low_52w: f64,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub long_name: Option<String>,
    pub sector: Option<String>,
}

/// One parsed row of the NSE equity listing CSV
#[derive(Debug, Clone)]
pub struct ListingRow {
    pub symbol: String,
    pub name: String,
    pub series: String,
    pub listing_date: String,
    pub isin: String,
}

/// One keyword -> sector classification rule (ordered, first match wins)
#[derive(Debug, Clone, Deserialize)]
pub struct SectorKeyword {
    pub keyword: String,
    pub sector: String,
}

/// Configuration for the update pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Provider
    pub request_timeout_sec: u64,
    pub max_retries: u32,
    pub retry_backoff_floor_sec: u64,
    pub retry_backoff_ceiling_sec: u64,
    pub symbol_suffix: String,

    // Refresh
    pub refresh_workers: usize,
    pub inter_request_delay_ms: u64,

    // Listing
    pub listing_url: String,
    pub equity_series: String,

    // Aggregation
    pub min_sector_stocks: usize,
    pub top_sectors_count: usize,
    pub proxy_weight_multiplier: f64,

    // Sector classification
    pub sector_keywords: Vec<SectorKeyword>,

    // Storage
    pub data_dir: String,

    // Logging
    pub log_level: String,
}
