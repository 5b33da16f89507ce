pub mod yahoo;

pub use yahoo::{QuoteSource, YahooClient};
