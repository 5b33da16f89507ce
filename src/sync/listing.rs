/// Listing synchronization against the NSE equity master CSV
use std::collections::HashSet;
use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info};

use crate::error::{MarketError, Result};
use crate::store::StockStore;
use crate::types::{Config, ListingRow, SectorKeyword};

/// Heuristic company-name -> sector classifier.
///
/// Rules are an ordered list injected from configuration; the first
/// keyword found in the upper-cased company name wins, unmatched names
/// fall back to "Other". This is a naming heuristic, not an authoritative
/// classification.
pub struct SectorClassifier {
    rules: Vec<SectorKeyword>,
}

impl SectorClassifier {
    pub fn new(rules: Vec<SectorKeyword>) -> Self {
        SectorClassifier { rules }
    }

    pub fn classify(&self, company_name: &str) -> &str {
        let name = company_name.to_uppercase();
        for rule in &self.rules {
            if name.contains(&rule.keyword) {
                return &rule.sector;
            }
        }
        "Other"
    }
}

/// Reconciles the persisted stock universe against the NSE listing file
pub struct ListingSynchronizer {
    client: Client,
    listing_url: String,
    equity_series: String,
    classifier: SectorClassifier,
    store: Arc<StockStore>,
}

impl ListingSynchronizer {
    pub fn new(config: &Config, store: Arc<StockStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_sec))
            .build()
            .map_err(MarketError::HttpError)?;

        Ok(ListingSynchronizer {
            client,
            listing_url: config.listing_url.clone(),
            equity_series: config.equity_series.clone(),
            classifier: SectorClassifier::new(config.sector_keywords.clone()),
            store,
        })
    }

    /// Download the listing, upsert every equity row and delete delisted
    /// symbols. Returns the current symbol universe. Any download or
    /// parse failure aborts the run - without a listing there is nothing
    /// to refresh.
    pub async fn reconcile(&self) -> Result<HashSet<String>> {
        info!("📥 Downloading NSE listing from {}", self.listing_url);

        let response = self
            .client
            .get(&self.listing_url)
            .send()
            .await
            .map_err(|e| MarketError::ListingUnavailable(format!("download failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::ListingUnavailable(format!(
                "listing request returned HTTP {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| MarketError::ListingUnavailable(format!("body read failed: {}", e)))?;

        let rows = parse_listing_csv(&body)?;
        info!("✅ Parsed {} listing rows", rows.len());

        self.apply(&rows).await
    }

    /// Apply parsed reference rows to the store
    pub async fn apply(&self, rows: &[ListingRow]) -> Result<HashSet<String>> {
        let mut universe = HashSet::new();
        let mut created = 0usize;

        for row in rows {
            if row.series != self.equity_series {
                continue;
            }

            let name = title_case(&row.name);
            let sector = self.classifier.classify(&row.name);

            if self.store.upsert_listing(&row.symbol, &name, sector).await {
                created += 1;
            }
            universe.insert(row.symbol.clone());
        }

        if universe.is_empty() {
            return Err(MarketError::ListingUnavailable(
                "listing contained no equity rows".to_string(),
            ));
        }

        let removed = self.store.remove_absent(&universe).await;
        for symbol in &removed {
            debug!("Delisted: {}", symbol);
        }

        info!(
            "✅ Listing reconciled: {} symbols ({} new, {} delisted)",
            universe.len(),
            created,
            removed.len()
        );

        Ok(universe)
    }
}

/// Parse the NSE EQUITY_L.csv payload.
/// NSE pads both headers and fields with spaces, hence Trim::All.
pub fn parse_listing_csv(body: &str) -> Result<Vec<ListingRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let col = |name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            MarketError::ListingUnavailable(format!("listing is missing column '{}'", name))
        })
    };

    let symbol_col = col("SYMBOL")?;
    let name_col = col("NAME OF COMPANY")?;
    let series_col = col("SERIES")?;
    let date_col = col("DATE OF LISTING")?;
    let isin_col = col("ISIN NUMBER")?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or("").to_string();

        let symbol = field(symbol_col);
        if symbol.is_empty() {
            continue;
        }

        rows.push(ListingRow {
            symbol,
            name: field(name_col),
            series: field(series_col),
            listing_date: field(date_col),
            isin: field(isin_col),
        });
    }

    Ok(rows)
}

/// Title-case a company name ("ALPHA BANK LTD" -> "Alpha Bank Ltd")
pub fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
