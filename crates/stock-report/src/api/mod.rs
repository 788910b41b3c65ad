//! Data-provider collaborators and their live adapters
//!
//! The report pipeline and the averaging desk only see the traits below.
//! Clients are plain values built from configuration and handed in as
//! `Arc<dyn ...>`, so tests substitute mocks or fakes freely.

pub mod sec_edgar;
pub mod yahoo;

use crate::error::Result;
use crate::models::{FinancialSnapshot, FiscalPeriod, HoldingSnapshot, PriceRange, PriceSeries, Quote};
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

pub use sec_edgar::SecEdgarClient;
pub use yahoo::YahooFinanceClient;

/// Price history and latest quotes
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_price_series(&self, symbol: &str, range: PriceRange) -> Result<PriceSeries>;

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote>;
}

/// Financial statement figures
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FinancialProvider: Send + Sync {
    async fn fetch_financial_snapshot(
        &self,
        symbol: &str,
        period: FiscalPeriod,
    ) -> Result<FinancialSnapshot>;

    /// Up to `periods` annual snapshots, most recent first
    async fn fetch_financial_history(
        &self,
        symbol: &str,
        periods: usize,
    ) -> Result<Vec<FinancialSnapshot>>;
}

/// Account positions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BrokerProvider: Send + Sync {
    /// `Ok(None)` when the account has no position in `symbol`
    async fn fetch_holding(&self, symbol: &str) -> Result<Option<HoldingSnapshot>>;
}
