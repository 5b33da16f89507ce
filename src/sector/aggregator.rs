/// Market-cap-weighted sector performance aggregation
use std::collections::HashMap;

use chrono::Utc;
use tracing::info;

use crate::error::Result;
use crate::store::{SectorStore, StockStore};
use crate::types::{SectorSummary, Stock};

/// Recomputes the sector summary table from persisted stock rows.
///
/// Performance per sector is the market-cap-weighted average of the
/// constituent change percentages. Stocks without a usable market cap
/// get a proxy weight of `current_price * proxy_weight_multiplier`,
/// because newly listed symbols frequently have no cap yet.
pub struct SectorAggregator {
    min_sector_stocks: usize,
    top_sectors_count: usize,
    proxy_weight_multiplier: f64,
}

impl SectorAggregator {
    pub fn new(min_sector_stocks: usize, top_sectors_count: usize, proxy_weight_multiplier: f64) -> Self {
        SectorAggregator {
            min_sector_stocks,
            top_sectors_count,
            proxy_weight_multiplier,
        }
    }

    /// Recompute the top-N sector summaries from current stock rows.
    /// Pure read-and-compute; publishing is a separate step.
    pub async fn recompute(&self, store: &StockStore) -> Vec<SectorSummary> {
        let stocks = store.all().await;
        self.compute(&stocks)
    }

    /// Recompute and atomically replace the persisted summary table
    pub async fn publish(&self, stocks: &StockStore, sectors: &SectorStore) -> Result<Vec<SectorSummary>> {
        let summaries = self.recompute(stocks).await;

        info!("📊 Computed {} sector summaries", summaries.len());
        for summary in &summaries {
            info!(
                "   {}: {:+.2}% ({} stocks)",
                summary.name, summary.performance, summary.stocks_count
            );
        }

        sectors.replace_all(summaries.clone()).await?;
        Ok(summaries)
    }

    fn compute(&self, stocks: &[Stock]) -> Vec<SectorSummary> {
        struct Accumulator {
            weighted_change: f64,
            total_weight: f64,
            count: usize,
        }

        let mut by_sector: HashMap<String, Accumulator> = HashMap::new();

        for stock in stocks {
            let sector = match usable_sector(stock) {
                Some(sector) => sector,
                None => continue,
            };
            let change = match stock.change_percentage {
                Some(change) if stock.current_price > 0.0 => change,
                _ => continue,
            };

            let weight = if stock.market_cap > 0.0 {
                stock.market_cap
            } else {
                stock.current_price * self.proxy_weight_multiplier
            };

            let acc = by_sector.entry(sector).or_insert(Accumulator {
                weighted_change: 0.0,
                total_weight: 0.0,
                count: 0,
            });
            acc.weighted_change += change * weight;
            acc.total_weight += weight;
            acc.count += 1;
        }

        let now = Utc::now();
        let mut summaries: Vec<SectorSummary> = by_sector
            .into_iter()
            .filter(|(_, acc)| acc.count >= self.min_sector_stocks && acc.total_weight > 0.0)
            .map(|(name, acc)| SectorSummary {
                name,
                performance: round2(acc.weighted_change / acc.total_weight),
                stocks_count: acc.count,
                last_updated: now,
            })
            .collect();

        // Best movers in either direction first
        summaries.sort_by(|a, b| {
            b.performance
                .abs()
                .partial_cmp(&a.performance.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        summaries.truncate(self.top_sectors_count);

        summaries
    }
}

/// Sector label usable for aggregation: present, non-empty, not "Unknown"
fn usable_sector(stock: &Stock) -> Option<String> {
    let sector = stock.sector.as_deref()?.trim();
    if sector.is_empty() || sector.eq_ignore_ascii_case("unknown") {
        return None;
    }
    Some(sector.to_string())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
