//! Yahoo Finance market-data adapter

use super::MarketDataProvider;
use crate::error::{Result, StockError};
use crate::models::{PriceBar, PriceRange, PriceSeries, Quote};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use tracing::debug;
use yahoo_finance_api as yahoo;

const PROVIDER: &str = "yahoo";

/// Map a bare six-digit KRX code to its Yahoo ticker
///
/// Anything else is passed through upper-cased.
pub fn yahoo_ticker(symbol: &str) -> String {
    let symbol = symbol.trim();
    if symbol.len() == 6 && symbol.bytes().all(|b| b.is_ascii_digit()) {
        format!("{symbol}.KS")
    } else {
        symbol.to_uppercase()
    }
}

fn to_bar(quote: &yahoo::Quote) -> Option<PriceBar> {
    Some(PriceBar {
        timestamp: DateTime::from_timestamp(quote.timestamp as i64, 0)?,
        open: quote.open,
        high: quote.high,
        low: quote.low,
        close: quote.close,
        volume: quote.volume,
    })
}

/// Yahoo Finance client
#[derive(Debug, Clone, Default)]
pub struct YahooFinanceClient {}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self {}
    }

    fn connector() -> Result<yahoo::YahooConnector> {
        yahoo::YahooConnector::new().map_err(|e| StockError::upstream(PROVIDER, e))
    }

    async fn history(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<PriceSeries> {
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| StockError::InvalidInput(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| StockError::InvalidInput(format!("Invalid end timestamp: {e}")))?;

        let response = Self::connector()?
            .get_quote_history(&yahoo_ticker(symbol), start_odt, end_odt)
            .await
            .map_err(|e| StockError::upstream(PROVIDER, e))?;
        let quotes = response
            .quotes()
            .map_err(|e| StockError::upstream(PROVIDER, e))?;

        let bars: Vec<PriceBar> = quotes.iter().filter_map(to_bar).collect();
        debug!(symbol, bars = bars.len(), "fetched price history");
        Ok(PriceSeries::new(symbol, bars))
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    async fn fetch_price_series(&self, symbol: &str, range: PriceRange) -> Result<PriceSeries> {
        let end = Utc::now();
        let start = end - chrono::Duration::days(range.days());
        self.history(symbol, start, end).await
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let response = Self::connector()?
            .get_latest_quotes(&yahoo_ticker(symbol), "1d")
            .await
            .map_err(|e| StockError::upstream(PROVIDER, e))?;
        let quotes = response
            .quotes()
            .map_err(|e| StockError::upstream(PROVIDER, e))?;

        let series = PriceSeries::new(symbol, quotes.iter().filter_map(to_bar).collect());
        Quote::from_series(&series)
            .ok_or_else(|| StockError::upstream(PROVIDER, format!("no quote for {symbol}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yahoo_ticker() {
        assert_eq!(yahoo_ticker("005930"), "005930.KS");
        assert_eq!(yahoo_ticker(" aapl "), "AAPL");
        assert_eq!(yahoo_ticker("BRK-B"), "BRK-B");
        assert_eq!(yahoo_ticker("12345"), "12345");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_quote() {
        let client = YahooFinanceClient::new();
        let quote = client.fetch_quote("AAPL").await.unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert!(quote.price > 0.0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_price_series() {
        let client = YahooFinanceClient::new();
        let series = client
            .fetch_price_series("AAPL", PriceRange::OneMonth)
            .await
            .unwrap();
        assert!(!series.is_empty());
        assert!(series.validate().is_ok());
    }
}
