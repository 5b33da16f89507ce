/// Configuration loading from TOML file
use std::path::Path;

use crate::error::{MarketError, Result};
use crate::types::Config;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MarketError::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| MarketError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    if config.listing_url.is_empty() {
        return Err(MarketError::ConfigError("listing_url is empty".to_string()));
    }

    if config.refresh_workers == 0 {
        return Err(MarketError::ConfigError(
            "refresh_workers must be >= 1".to_string(),
        ));
    }

    if config.max_retries == 0 {
        return Err(MarketError::ConfigError(
            "max_retries must be >= 1".to_string(),
        ));
    }

    if config.retry_backoff_floor_sec > config.retry_backoff_ceiling_sec {
        return Err(MarketError::ConfigError(format!(
            "retry_backoff_floor_sec ({}) must be <= retry_backoff_ceiling_sec ({})",
            config.retry_backoff_floor_sec, config.retry_backoff_ceiling_sec
        )));
    }

    if config.min_sector_stocks < 1 {
        return Err(MarketError::ConfigError(
            "min_sector_stocks must be >= 1".to_string(),
        ));
    }

    if config.top_sectors_count == 0 {
        return Err(MarketError::ConfigError(
            "top_sectors_count must be >= 1".to_string(),
        ));
    }

    if config.proxy_weight_multiplier <= 0.0 {
        return Err(MarketError::ConfigError(format!(
            "Invalid proxy_weight_multiplier: {}",
            config.proxy_weight_multiplier
        )));
    }

    Ok(())
}
