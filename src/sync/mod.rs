pub mod listing;
pub mod refresh;

pub use listing::{ListingSynchronizer, SectorClassifier};
pub use refresh::{RefreshOrchestrator, RefreshReport};
