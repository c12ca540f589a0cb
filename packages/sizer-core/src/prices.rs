//! Live price lookup.
//!
//! The core only depends on [`PriceSource`]. Every lookup failure collapses
//! to `None` through [`PriceSource::get_live_price`], so a slow or missing
//! quote never aborts a summary or alert pass.

use std::collections::HashMap;

/// Why a price lookup produced no quote.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LookupError {
    #[error("price lookup timed out")]
    Timeout,

    #[error("no price for ticker: {0}")]
    NotFound(String),

    #[error("malformed price response: {0}")]
    Malformed(String),

    #[error("price transport error: {0}")]
    Transport(String),
}

/// A source of current market prices.
pub trait PriceSource {
    /// Look up the latest price for `ticker`.
    fn live_price(&self, ticker: &str) -> Result<f64, LookupError>;

    /// Look up a price, turning every failure into `None`.
    fn get_live_price(&self, ticker: &str) -> Option<f64> {
        match self.live_price(ticker) {
            Ok(price) if price.is_finite() && price > 0.0 => Some(price),
            Ok(price) => {
                tracing::warn!(ticker, price, "Ignoring non-positive price");
                None
            }
            Err(e) => {
                tracing::warn!(ticker, error = %e, "Live price unavailable");
                None
            }
        }
    }
}

/// Fixed ticker-to-price table, keyed by uppercase ticker.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    prices: HashMap<String, f64>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a quote.
    pub fn with_price(mut self, ticker: &str, price: f64) -> Self {
        self.prices.insert(ticker.trim().to_uppercase(), price);
        self
    }
}

impl FromIterator<(String, f64)> for StaticPriceSource {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |source, (ticker, price)| {
                source.with_price(&ticker, price)
            })
    }
}

impl PriceSource for StaticPriceSource {
    fn live_price(&self, ticker: &str) -> Result<f64, LookupError> {
        let key = ticker.trim().to_uppercase();
        self.prices
            .get(&key)
            .copied()
            .ok_or(LookupError::NotFound(key))
    }
}

#[cfg(feature = "live-prices")]
pub use http::HttpPriceSource;

#[cfg(feature = "live-prices")]
mod http {
    use super::{LookupError, PriceSource};
    use crate::config::Settings;
    use crate::{Error, Result};
    use reqwest::blocking::Client;
    use reqwest::StatusCode;
    use serde::Deserialize;
    use std::time::Duration;

    #[derive(Debug, Deserialize)]
    struct ChartResponse {
        chart: Chart,
    }

    #[derive(Debug, Deserialize)]
    struct Chart {
        result: Option<Vec<ChartResult>>,
    }

    #[derive(Debug, Deserialize)]
    struct ChartResult {
        meta: ChartMeta,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ChartMeta {
        regular_market_price: Option<f64>,
    }

    /// Quote lookups against a Yahoo-style chart endpoint.
    pub struct HttpPriceSource {
        client: Client,
        base_url: String,
        ticker_suffix: String,
    }

    impl HttpPriceSource {
        /// Create a source with an explicit endpoint, suffix and timeout.
        pub fn new(base_url: &str, ticker_suffix: &str, timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("sizer/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

            Ok(Self {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
                ticker_suffix: ticker_suffix.to_string(),
            })
        }

        /// Create a source from settings.
        pub fn from_settings(settings: &Settings) -> Result<Self> {
            Self::new(
                &settings.price_api_url,
                &settings.ticker_suffix,
                Duration::from_secs(settings.price_timeout_secs),
            )
        }

        fn symbol(&self, ticker: &str) -> String {
            let ticker = ticker.trim().to_uppercase();
            if self.ticker_suffix.is_empty() || ticker.contains('.') {
                ticker
            } else {
                format!("{}{}", ticker, self.ticker_suffix)
            }
        }
    }

    impl PriceSource for HttpPriceSource {
        fn live_price(&self, ticker: &str) -> std::result::Result<f64, LookupError> {
            let symbol = self.symbol(ticker);
            let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
            tracing::debug!(url = %url, "Fetching live price");

            let response = self
                .client
                .get(&url)
                .query(&[("interval", "1d"), ("range", "1d")])
                .send()
                .map_err(|e| {
                    if e.is_timeout() {
                        LookupError::Timeout
                    } else {
                        LookupError::Transport(e.to_string())
                    }
                })?;

            match response.status() {
                StatusCode::NOT_FOUND => return Err(LookupError::NotFound(symbol)),
                status if !status.is_success() => {
                    return Err(LookupError::Transport(format!("HTTP {}", status)))
                }
                _ => {}
            }

            let body = response.bytes().map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout
                } else {
                    LookupError::Transport(e.to_string())
                }
            })?;

            parse_chart(&body, symbol)
        }
    }

    /// Pull the regular market price out of a chart response body.
    fn parse_chart(body: &[u8], symbol: String) -> std::result::Result<f64, LookupError> {
        let chart: ChartResponse =
            serde_json::from_slice(body).map_err(|e| LookupError::Malformed(e.to_string()))?;

        chart
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .and_then(|r| r.meta.regular_market_price)
            .ok_or(LookupError::NotFound(symbol))
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource(LookupError);

    impl PriceSource for FailingSource {
        fn live_price(&self, _ticker: &str) -> Result<f64, LookupError> {
            Err(self.0.clone())
        }
    }

    #[test]
    fn test_static_source_is_case_insensitive() {
        let source = StaticPriceSource::new().with_price("tcs", 3810.0);

        assert_eq!(source.live_price("TCS"), Ok(3810.0));
        assert_eq!(source.get_live_price(" Tcs "), Some(3810.0));
    }

    #[test]
    fn test_static_source_miss() {
        let source = StaticPriceSource::new();
        assert_eq!(
            source.live_price("infy"),
            Err(LookupError::NotFound("INFY".to_string()))
        );
        assert_eq!(source.get_live_price("infy"), None);
    }

    #[test]
    fn test_failures_collapse_to_none() {
        assert_eq!(FailingSource(LookupError::Timeout).get_live_price("TCS"), None);
        assert_eq!(
            FailingSource(LookupError::Malformed("bad json".into())).get_live_price("TCS"),
            None
        );
    }

    #[test]
    fn test_non_positive_quote_is_none() {
        let source = StaticPriceSource::new().with_price("TCS", 0.0);
        assert_eq!(source.get_live_price("TCS"), None);
    }

    #[test]
    fn test_from_iterator() {
        let source: StaticPriceSource = vec![("a".to_string(), 1.0), ("b".to_string(), 2.0)]
            .into_iter()
            .collect();
        assert_eq!(source.get_live_price("B"), Some(2.0));
    }
}
