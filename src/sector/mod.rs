pub mod aggregator;

pub use aggregator::SectorAggregator;
