pub mod sector_store;
pub mod stock_store;

pub use sector_store::SectorStore;
pub use stock_store::StockStore;
