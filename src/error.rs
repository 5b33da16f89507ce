/// Centralized error types for the market-data pipeline
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    // Network Errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Provider error: {code} - {message}")]
    ProviderError { code: u16, message: String },

    // Data Errors
    #[error("No data for symbol: {0}")]
    NoData(String),

    #[error("Deserialization failed: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("CSV parse failed: {0}")]
    CsvError(#[from] csv::Error),

    // Listing Errors
    #[error("Listing unavailable: {0}")]
    ListingUnavailable(String),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Store Errors
    #[error("Store error: {0}")]
    StoreError(String),

    // File I/O Errors
    #[error("File I/O error: {0}")]
    FileError(#[from] std::io::Error),

    // Generic Errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type Result<T> = std::result::Result<T, MarketError>;

impl MarketError {
    /// Check if error is transient and worth retrying with backoff.
    ///
    /// The provider answers 401 for rate-limit pushback as well as 429,
    /// so both count as transient alongside 5xx and timeouts.
    pub fn is_transient(&self) -> bool {
        match self {
            MarketError::RateLimited(_) => true,
            MarketError::ProviderError { code, .. } => {
                *code == 401 || *code == 429 || *code >= 500
            }
            MarketError::HttpError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| {
                        s.as_u16() == 401 || s.as_u16() == 429 || s.is_server_error()
                    })
            }
            _ => false,
        }
    }

    /// Check if error must abort the whole batch run.
    ///
    /// Without a listing there is nothing to refresh, so a listing
    /// failure propagates; everything else is contained per symbol.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            MarketError::ListingUnavailable(_) | MarketError::ConfigError(_)
        )
    }

    /// Get error code for logging/monitoring
    pub fn error_code(&self) -> &str {
        match self {
            MarketError::HttpError(_) => "NET_001",
            MarketError::RateLimited(_) => "NET_002",
            MarketError::ProviderError { .. } => "NET_003",
            MarketError::NoData(_) => "DATA_001",
            MarketError::DeserializationError(_) => "DATA_002",
            MarketError::CsvError(_) => "DATA_003",
            MarketError::ListingUnavailable(_) => "LIST_001",
            MarketError::ConfigError(_) => "CFG_001",
            MarketError::StoreError(_) => "STORE_001",
            MarketError::FileError(_) => "FILE_001",
            MarketError::InternalError(_) => "INT_001",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(MarketError::RateLimited("slow down".to_string()).is_transient());
        assert!(MarketError::ProviderError {
            code: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(MarketError::ProviderError {
            code: 401,
            message: "too many requests".to_string()
        }
        .is_transient());
        assert!(!MarketError::NoData("XYZ".to_string()).is_transient());
        assert!(!MarketError::ProviderError {
            code: 404,
            message: "not found".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_batch_fatal_classification() {
        assert!(MarketError::ListingUnavailable("download failed".to_string()).is_batch_fatal());
        assert!(!MarketError::NoData("XYZ".to_string()).is_batch_fatal());
        assert!(!MarketError::RateLimited("slow down".to_string()).is_batch_fatal());
    }
}
