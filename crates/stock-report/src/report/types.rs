//! Report structure handed to formatting collaborators

use crate::fundamentals::FundamentalSet;
use crate::indicators::{IndicatorParams, IndicatorSet};
use crate::models::{FiscalPeriod, PriceRange, na};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-controlled report inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    pub range: PriceRange,
    pub indicators: IndicatorParams,
    /// Annual periods for the financial trend
    pub financial_periods: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            range: PriceRange::default(),
            indicators: IndicatorParams::default(),
            financial_periods: 3,
        }
    }
}

/// Lifecycle of one report request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Init,
    Fetching,
    Computing,
    Merged,
    Cached,
    Error,
}

impl ReportState {
    /// `Init → Fetching → Computing → Merged → Cached`, with `Error`
    /// reachable from any non-terminal state
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Fetching)
                | (Self::Fetching, Self::Computing)
                | (Self::Computing, Self::Merged)
                | (Self::Merged, Self::Cached)
                | (Self::Init | Self::Fetching | Self::Computing | Self::Merged, Self::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cached | Self::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    /// Every field computed
    Complete,
    /// Present with some fields `N/A` or from fallback data
    Degraded,
    /// Left out of the report
    Omitted,
}

impl SectionStatus {
    pub fn from_completeness(complete: bool) -> Self {
        if complete {
            Self::Complete
        } else {
            Self::Degraded
        }
    }
}

/// Per-section status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    pub basic: SectionStatus,
    pub price_trend: SectionStatus,
    pub metrics: SectionStatus,
    pub technical: SectionStatus,
    pub financial_trend: SectionStatus,
}

/// Non-fatal problems met while building a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportWarning {
    /// Financial statements could not be obtained
    PartialData { reason: String },
    /// Quote fetch failed; basic figures come from the price series
    QuoteFallback { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub symbol: String,
    /// Wall-clock time the report was assembled; the only field that differs
    /// between otherwise identical reports
    pub generated_at: DateTime<Utc>,
    /// Timestamp of the last price bar
    pub as_of: DateTime<Utc>,
    pub range: PriceRange,
    pub has_financials: bool,
    pub warnings: Vec<ReportWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub current_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub volume: u64,
    #[serde(with = "na")]
    pub market_cap: Option<f64>,
}

/// Returns in percent and the 52-week band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTrend {
    #[serde(with = "na")]
    pub return_1m: Option<f64>,
    #[serde(with = "na")]
    pub return_3m: Option<f64>,
    #[serde(with = "na")]
    pub return_1y: Option<f64>,
    #[serde(with = "na")]
    pub return_ytd: Option<f64>,
    #[serde(with = "na")]
    pub high_52w: Option<f64>,
    #[serde(with = "na")]
    pub low_52w: Option<f64>,
    #[serde(with = "na")]
    pub from_high_pct: Option<f64>,
    #[serde(with = "na")]
    pub from_low_pct: Option<f64>,
}

impl PriceTrend {
    pub fn is_complete(&self) -> bool {
        [
            self.return_1m,
            self.return_3m,
            self.return_1y,
            self.return_ytd,
            self.high_52w,
            self.low_52w,
        ]
        .iter()
        .all(Option::is_some)
    }
}

/// One annual row of the financial trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriodSummary {
    pub period: FiscalPeriod,
    #[serde(with = "na")]
    pub revenue: Option<f64>,
    #[serde(with = "na")]
    pub operating_income: Option<f64>,
    #[serde(with = "na")]
    pub net_income: Option<f64>,
    /// Operating income over revenue, percent
    #[serde(with = "na")]
    pub operating_margin: Option<f64>,
    /// Revenue growth against the previous year, percent
    #[serde(with = "na")]
    pub revenue_growth: Option<f64>,
}

/// Annual figures, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialTrend {
    pub periods: Vec<FinancialPeriodSummary>,
}

/// Canonical aggregate for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub basic: BasicInfo,
    pub price_trend: PriceTrend,
    pub metrics: FundamentalSet,
    pub technical: IndicatorSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_trend: Option<FinancialTrend>,
    pub sections: Sections,
}

impl Report {
    pub fn has_financials(&self) -> bool {
        self.metadata.has_financials
    }
}
