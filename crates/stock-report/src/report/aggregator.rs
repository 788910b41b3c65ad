//! Report orchestration: fetch, compute, merge

use super::merge::{MergeInputs, merge};
use super::types::{Report, ReportOptions, ReportState, ReportWarning};
use crate::api::{FinancialProvider, MarketDataProvider};
use crate::cache::{CacheKey, CacheManager};
use crate::config::ReportConfig;
use crate::error::{Result, StockError};
use crate::fundamentals::{FundamentalEngine, FundamentalSet};
use crate::indicators::IndicatorEngine;
use crate::models::{FinancialSnapshot, PriceRange, PriceSeries, Quote};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tracks one request through [`ReportState`]
struct Progress<'a> {
    symbol: &'a str,
    state: ReportState,
}

impl<'a> Progress<'a> {
    fn start(symbol: &'a str) -> Self {
        debug!(symbol, state = ?ReportState::Init, "report state");
        Self {
            symbol,
            state: ReportState::Init,
        }
    }

    fn advance(&mut self, next: ReportState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal report transition {:?} -> {next:?}",
            self.state
        );
        debug!(symbol = self.symbol, from = ?self.state, state = ?next, "report state");
        self.state = next;
    }

    fn fail(&mut self, err: StockError) -> StockError {
        self.advance(ReportState::Error);
        warn!(symbol = self.symbol, error = %err, "report failed");
        err
    }
}

/// Builds [`Report`]s from market and financial providers
///
/// Providers are called through the configured [`RetryPolicy`] with a
/// per-attempt timeout, and their results are cached per category.
///
/// [`RetryPolicy`]: crate::retry::RetryPolicy
pub struct ReportAggregator {
    market: Arc<dyn MarketDataProvider>,
    financials: Arc<dyn FinancialProvider>,
    config: ReportConfig,
    cache: CacheManager,
    fundamentals: FundamentalEngine,
}

impl ReportAggregator {
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        financials: Arc<dyn FinancialProvider>,
        config: ReportConfig,
    ) -> Self {
        let cache = CacheManager::new(&config);
        Self {
            market,
            financials,
            config,
            cache,
            fundamentals: FundamentalEngine::new(),
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Build the report for `symbol`
    ///
    /// Price history is required: its failure (or an empty or malformed
    /// series) fails the request. A failed quote falls back to the series,
    /// and failed financials leave the report with `has_financials = false`.
    pub async fn get_report(&self, symbol: &str, options: &ReportOptions) -> Result<Report> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(StockError::InvalidSymbol(symbol));
        }
        let engine = IndicatorEngine::new(options.indicators);

        info!(symbol = %symbol, range = %options.range, "generating report");
        let mut progress = Progress::start(&symbol);
        progress.advance(ReportState::Fetching);

        let (series, quote, history) = tokio::join!(
            self.price_series(&symbol, options.range),
            self.quote(&symbol),
            self.financial_history(&symbol, options.financial_periods),
        );

        let series = series.map_err(|e| progress.fail(e))?;
        if series.is_empty() {
            return Err(progress.fail(StockError::upstream(
                "market",
                format!("no price history for {symbol}"),
            )));
        }

        progress.advance(ReportState::Computing);
        let technical = engine.compute(&series).map_err(|e| progress.fail(e))?;

        let mut warnings = Vec::new();
        let quote = match quote {
            Ok(quote) => (quote, false),
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "quote unavailable, using price series");
                warnings.push(ReportWarning::QuoteFallback {
                    reason: err.to_string(),
                });
                let fallback = Quote::from_series(&series)
                    .ok_or_else(|| progress.fail(err.clone()))?;
                (fallback, true)
            }
        };

        let history = match history {
            Ok(history) if !history.is_empty() => Some(history),
            Ok(_) => {
                warn!(symbol = %symbol, "no financial statements");
                warnings.push(ReportWarning::PartialData {
                    reason: format!("no financial statements for {symbol}"),
                });
                None
            }
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "financials unavailable, continuing without");
                warnings.push(ReportWarning::PartialData {
                    reason: err.to_string(),
                });
                None
            }
        };

        let metrics = history
            .as_deref()
            .and_then(<[FinancialSnapshot]>::first)
            .map_or_else(FundamentalSet::unavailable, |latest| {
                self.fundamentals.compute(quote.0.price, latest)
            });

        let report = merge(MergeInputs {
            symbol: &symbol,
            options,
            series: &series,
            quote,
            technical,
            metrics,
            financials: history.as_deref(),
            warnings,
            generated_at: Utc::now(),
        });
        progress.advance(ReportState::Merged);

        // fetched inputs are already in the category caches
        progress.advance(ReportState::Cached);
        info!(
            symbol = %symbol,
            has_financials = report.metadata.has_financials,
            warnings = report.metadata.warnings.len(),
            "report ready"
        );
        Ok(report)
    }

    async fn price_series(&self, symbol: &str, range: PriceRange) -> Result<PriceSeries> {
        let key = CacheKey::new(symbol, "history", range);
        let ttl = self.config.history_ttl(range);
        let market = Arc::clone(&self.market);
        let retry = self.config.retry.clone();
        let timeout = self.config.fetch_timeout;
        let symbol = symbol.to_string();

        self.cache
            .history
            .get_or_fetch(key, ttl, move || async move {
                retry
                    .execute("price_series", timeout, || market.fetch_price_series(&symbol, range))
                    .await
            })
            .await
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let key = CacheKey::new(symbol, "quote", ());
        let market = Arc::clone(&self.market);
        let retry = self.config.retry.clone();
        let timeout = self.config.fetch_timeout;
        let symbol = symbol.to_string();

        self.cache
            .quotes
            .get_or_fetch(key, self.config.cache_ttl_quote, move || async move {
                retry
                    .execute("quote", timeout, || market.fetch_quote(&symbol))
                    .await
            })
            .await
    }

    async fn financial_history(&self, symbol: &str, periods: usize) -> Result<Vec<FinancialSnapshot>> {
        let key = CacheKey::new(symbol, "financials", periods);
        let financials = Arc::clone(&self.financials);
        let retry = self.config.retry.clone();
        let timeout = self.config.fetch_timeout;
        let symbol = symbol.to_string();

        self.cache
            .financials
            .get_or_fetch(key, self.config.cache_ttl_financial, move || async move {
                retry
                    .execute("financial_history", timeout, || {
                        financials.fetch_financial_history(&symbol, periods.max(1))
                    })
                    .await
            })
            .await
    }
}
