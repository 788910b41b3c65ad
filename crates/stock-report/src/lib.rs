//! Stock analytics and report aggregation
//!
//! This crate turns market and filing data into a structured stock report
//! and backs a cost-averaging calculator. It includes:
//!
//! - Technical indicators: moving averages, RSI, Bollinger Bands, trend
//! - Fundamental ratios: PER, PBR, ROE, EPS, BPS, dividend yield
//! - Report aggregation with per-category TTL caching, request coalescing
//!   and per-section failure isolation
//! - Cost-averaging ("물타기") arithmetic: quantity and amount modes,
//!   scenario tables and target-price inversion
//! - Adapters for Yahoo Finance (prices) and SEC EDGAR (annual financials)
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_report::{ReportAggregator, ReportConfig, ReportOptions};
//! use stock_report::api::{SecEdgarClient, YahooFinanceClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ReportConfig::from_env()?;
//!     let aggregator = ReportAggregator::new(
//!         Arc::new(YahooFinanceClient::new()),
//!         Arc::new(SecEdgarClient::new(config.sec_user_agent.clone())),
//!         config,
//!     );
//!
//!     let report = aggregator.get_report("AAPL", &ReportOptions::default()).await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod averaging;
pub mod cache;
pub mod config;
pub mod error;
pub mod fundamentals;
pub mod indicators;
pub mod models;
pub mod report;
pub mod retry;

pub use averaging::{
    AveragingCalculator, AveragingDesk, AveragingMode, AveragingResult, Position, Scenario,
    TargetQuantity,
};
pub use config::{ReportConfig, ReportConfigBuilder};
pub use error::{Result, StockError};
pub use fundamentals::{FundamentalEngine, FundamentalSet};
pub use indicators::{IndicatorEngine, IndicatorParams, IndicatorSet};
pub use models::{FinancialSnapshot, FiscalPeriod, HoldingSnapshot, PriceBar, PriceRange, PriceSeries, Quote};
pub use report::{Report, ReportAggregator, ReportOptions};
pub use retry::RetryPolicy;
