/// Yahoo Finance REST client for per-symbol quotes and fundamentals
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{MarketError, Result};
use crate::types::{Config, Quote};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryEnvelope,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    result: Option<Vec<SummaryResult>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct SummaryResult {
    price: Option<PriceModule>,
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetail>,
    #[serde(rename = "assetProfile")]
    asset_profile: Option<AssetProfile>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "marketCap")]
    market_cap: Option<RawValue>,
    #[serde(rename = "regularMarketPreviousClose")]
    regular_market_previous_close: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct SummaryDetail {
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct AssetProfile {
    sector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    description: Option<String>,
}

/// Source of per-symbol quotes, mockable for orchestrator tests
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch the latest quote for a bare NSE symbol.
    ///
    /// `Ok(None)` means the provider has no usable data for the symbol
    /// (missing price, delisted) - a normal outcome, not a failure.
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>>;
}

/// Yahoo Finance client with bounded retry on transient failures
pub struct YahooClient {
    client: Client,
    symbol_suffix: String,
    max_retries: u32,
    backoff_floor_sec: u64,
    backoff_ceiling_sec: u64,
}

impl YahooClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_sec))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) nsepulse/0.1")
            .build()
            .map_err(MarketError::HttpError)?;

        Ok(YahooClient {
            client,
            symbol_suffix: config.symbol_suffix.clone(),
            max_retries: config.max_retries,
            backoff_floor_sec: config.retry_backoff_floor_sec,
            backoff_ceiling_sec: config.retry_backoff_ceiling_sec,
        })
    }

    /// One fetch attempt: chart (price + 1y history) then fundamentals
    async fn fetch_once(&self, ticker: &str) -> Result<Option<Quote>> {
        let chart = match self.fetch_chart(ticker).await? {
            Some(chart) => chart,
            None => return Ok(None),
        };

        let current_price = chart.meta.regular_market_price.unwrap_or(0.0);
        if current_price <= 0.0 {
            debug!("No current price for {}", ticker);
            return Ok(None);
        }

        let daily = chart.indicators.quote.into_iter().next().unwrap_or_default();
        let (high_52w, low_52w) = week_52_range(&daily.high, &daily.low, current_price);

        // Fundamentals are best-effort: the original falls back to safe
        // defaults when info fields are missing.
        let mut quote = Quote {
            current_price,
            previous_close: previous_close_from_history(&daily.close),
            high_52w,
            low_52w,
            ..Default::default()
        };

        match self.fetch_summary(ticker).await {
            Ok(Some(summary)) => {
                if let Some(price) = summary.price {
                    quote.long_name = price.long_name;
                    quote.market_cap = price.market_cap.and_then(|v| v.raw);
                    if let Some(prev) = price
                        .regular_market_previous_close
                        .and_then(|v| v.raw)
                    {
                        quote.previous_close = prev;
                    }
                }
                quote.pe_ratio = summary
                    .summary_detail
                    .and_then(|d| d.trailing_pe)
                    .and_then(|v| v.raw);
                quote.sector = summary.asset_profile.and_then(|p| p.sector);
            }
            Ok(None) => {
                debug!("No quoteSummary data for {}", ticker);
            }
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                warn!("quoteSummary failed for {}: {} - continuing with chart data", ticker, e);
            }
        }

        if is_delisted(quote.long_name.as_deref()) {
            debug!("{} marked delisted", ticker);
            return Ok(None);
        }

        Ok(Some(quote))
    }

    async fn fetch_chart(&self, ticker: &str) -> Result<Option<ChartResult>> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=1y&interval=1d",
            BASE_URL, ticker
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MarketError::ProviderError {
                code: status.as_u16(),
                message: format!("chart request failed for {}", ticker),
            });
        }

        let body = response.text().await?;
        let chart_response: ChartResponse = serde_json::from_str(&body)?;

        if let Some(err) = chart_response.chart.error {
            debug!(
                "Chart error for {}: {} - {}",
                ticker,
                err.code.unwrap_or_default(),
                err.description.unwrap_or_default()
            );
            return Ok(None);
        }

        Ok(chart_response
            .chart
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            }))
    }

    async fn fetch_summary(&self, ticker: &str) -> Result<Option<SummaryResult>> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules=price,summaryDetail,assetProfile",
            BASE_URL, ticker
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(MarketError::ProviderError {
                code: status.as_u16(),
                message: format!("quoteSummary request failed for {}", ticker),
            });
        }

        let body = response.text().await?;
        let summary_response: SummaryResponse = serde_json::from_str(&body)?;

        if summary_response.quote_summary.error.is_some() {
            return Ok(None);
        }

        Ok(summary_response
            .quote_summary
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            }))
    }
}

#[async_trait]
impl QuoteSource for YahooClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let ticker = format!("{}{}", symbol, self.symbol_suffix);
        let mut backoff_sec = self.backoff_floor_sec;

        // Bounded retry loop: transient failures back off exponentially
        // up to the ceiling, everything else surfaces immediately.
        for attempt in 1..=self.max_retries {
            match self.fetch_once(&ticker).await {
                Ok(quote) => return Ok(quote),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    warn!(
                        "Transient error for {} (attempt {}/{}): {} - retrying in {}s",
                        ticker, attempt, self.max_retries, e, backoff_sec
                    );
                    sleep(std::time::Duration::from_secs(backoff_sec)).await;
                    backoff_sec = (backoff_sec * 2).min(self.backoff_ceiling_sec);
                }
                Err(e) => return Err(e),
            }
        }

        Err(MarketError::InternalError(format!(
            "retry loop exhausted for {}",
            ticker
        )))
    }
}

/// 52-week high/low from a year of daily candles.
/// Falls back to the current price when history is absent.
fn week_52_range(highs: &[Option<f64>], lows: &[Option<f64>], current_price: f64) -> (f64, f64) {
    let high = highs
        .iter()
        .flatten()
        .copied()
        .fold(f64::NAN, f64::max);
    let low = lows.iter().flatten().copied().fold(f64::NAN, f64::min);

    if high.is_nan() || low.is_nan() {
        (current_price, current_price)
    } else {
        (high, low)
    }
}

/// Previous close from the daily close series (second-to-last entry)
fn previous_close_from_history(closes: &[Option<f64>]) -> f64 {
    let valid: Vec<f64> = closes.iter().flatten().copied().collect();
    if valid.len() >= 2 {
        valid[valid.len() - 2]
    } else {
        0.0
    }
}

fn is_delisted(long_name: Option<&str>) -> bool {
    long_name
        .map(|n| n.to_lowercase().contains("delisted"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_52_range_from_history() {
        let highs = vec![Some(120.0), None, Some(150.0), Some(110.0)];
        let lows = vec![Some(95.0), Some(80.0), None, Some(100.0)];
        let (high, low) = week_52_range(&highs, &lows, 105.0);
        assert_eq!(high, 150.0);
        assert_eq!(low, 80.0);
    }

    #[test]
    fn test_week_52_range_falls_back_to_current() {
        let (high, low) = week_52_range(&[], &[], 105.0);
        assert_eq!(high, 105.0);
        assert_eq!(low, 105.0);
    }

    #[test]
    fn test_previous_close_skips_nulls() {
        let closes = vec![Some(100.0), None, Some(102.0), Some(104.0)];
        assert_eq!(previous_close_from_history(&closes), 102.0);
        assert_eq!(previous_close_from_history(&[Some(100.0)]), 0.0);
    }

    #[test]
    fn test_delisted_detection() {
        assert!(is_delisted(Some("Foo Ltd (Delisted)")));
        assert!(!is_delisted(Some("Foo Ltd")));
        assert!(!is_delisted(None));
    }

    #[test]
    fn test_chart_response_parsing() {
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {"regularMarketPrice": 2850.5},
                    "indicators": {
                        "quote": [{
                            "high": [2900.0, 2920.0],
                            "low": [2780.0, 2800.0],
                            "close": [2840.0, 2850.5]
                        }]
                    }
                }],
                "error": null
            }
        }"#;

        let parsed: ChartResponse = serde_json::from_str(body).unwrap();
        let result = parsed.chart.result.unwrap().remove(0);
        assert_eq!(result.meta.regular_market_price, Some(2850.5));
        assert_eq!(result.indicators.quote[0].close.len(), 2);
    }

    #[test]
    fn test_summary_response_parsing() {
        let body = r#"{
            "quoteSummary": {
                "result": [{
                    "price": {
                        "longName": "Reliance Industries Limited",
                        "marketCap": {"raw": 1.93e13},
                        "regularMarketPreviousClose": {"raw": 2840.0}
                    },
                    "summaryDetail": {"trailingPE": {"raw": 27.4}},
                    "assetProfile": {"sector": "Energy"}
                }],
                "error": null
            }
        }"#;

        let parsed: SummaryResponse = serde_json::from_str(body).unwrap();
        let result = parsed.quote_summary.result.unwrap().remove(0);
        assert_eq!(
            result.price.as_ref().unwrap().long_name.as_deref(),
            Some("Reliance Industries Limited")
        );
        assert_eq!(
            result.asset_profile.unwrap().sector.as_deref(),
            Some("Energy")
        );
    }
}
