pub mod config;
pub mod error;
pub mod provider;
pub mod sector;
pub mod store;
pub mod sync;
pub mod types;

pub use error::{MarketError, Result};
pub use types::*;
