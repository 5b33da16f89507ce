/// Persisted sector summary table, fully replaced on every aggregation run
use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::types::SectorSummary;

/// Derived sector summaries behind a single write lock.
///
/// `replace_all` holds the write lock across the swap and the disk write,
/// so concurrent aggregation runs cannot interleave and readers never see
/// a half-replaced table.
pub struct SectorStore {
    sectors: RwLock<Vec<SectorSummary>>,
    disk_file: PathBuf,
}

impl SectorStore {
    pub fn new(disk_file: PathBuf) -> Self {
        SectorStore {
            sectors: RwLock::new(Vec::new()),
            disk_file,
        }
    }

    /// Load the last published summaries; missing file is an empty table
    pub async fn load(&self) -> Result<usize> {
        if !self.disk_file.exists() {
            debug!("No existing sector snapshot at {}", self.disk_file.display());
            return Ok(0);
        }

        let body = tokio::fs::read_to_string(&self.disk_file).await?;
        let rows: Vec<SectorSummary> = serde_json::from_str(&body)?;
        let count = rows.len();

        let mut sectors = self.sectors.write().await;
        *sectors = rows;

        Ok(count)
    }

    /// Delete-all then recreate, as one critical section
    pub async fn replace_all(&self, summaries: Vec<SectorSummary>) -> Result<()> {
        let mut sectors = self.sectors.write().await;

        let json = serde_json::to_string_pretty(&summaries)?;
        if let Some(parent) = self.disk_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.disk_file, json).await?;

        *sectors = summaries;
        debug!("Published {} sector summaries", sectors.len());
        Ok(())
    }

    /// All summaries, best movers (largest |performance|) first
    pub async fn all(&self) -> Vec<SectorSummary> {
        let sectors = self.sectors.read().await;
        let mut rows = sectors.clone();
        rows.sort_by(|a, b| {
            b.performance
                .abs()
                .partial_cmp(&a.performance.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        rows
    }

    pub async fn len(&self) -> usize {
        let sectors = self.sectors.read().await;
        sectors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn summary(name: &str, performance: f64) -> SectorSummary {
        SectorSummary {
            name: name.to_string(),
            performance,
            stocks_count: 3,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_replace_all_swaps_table() {
        let path = std::env::temp_dir().join("test_replace_sectors.json");
        let store = SectorStore::new(path.clone());

        store
            .replace_all(vec![summary("Energy", 1.0), summary("Healthcare", -2.5)])
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);

        store.replace_all(vec![summary("Utilities", 0.4)]).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(store.all().await[0].name, "Utilities");

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_all_orders_by_absolute_performance() {
        let path = std::env::temp_dir().join("test_order_sectors.json");
        let store = SectorStore::new(path.clone());

        store
            .replace_all(vec![
                summary("Energy", 1.0),
                summary("Healthcare", -2.5),
                summary("Utilities", 0.4),
            ])
            .await
            .unwrap();

        let rows = store.all().await;
        assert_eq!(rows[0].name, "Healthcare");
        assert_eq!(rows[1].name, "Energy");
        assert_eq!(rows[2].name, "Utilities");

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_load_round_trip() {
        let path = std::env::temp_dir().join("test_load_sectors.json");
        let store = SectorStore::new(path.clone());
        store.replace_all(vec![summary("Energy", 1.0)]).await.unwrap();

        let reloaded = SectorStore::new(path.clone());
        assert_eq!(reloaded.load().await.unwrap(), 1);
        assert_eq!(reloaded.all().await[0].name, "Energy");

        let _ = std::fs::remove_file(path);
    }
}
