//! Report aggregation
//!
//! [`ReportAggregator`] fetches price history, the latest quote and annual
//! financials concurrently, runs the indicator and fundamental engines, and
//! merges everything into one [`Report`]. Price history is the only fatal
//! input; every other gap degrades its section and is recorded as a
//! [`ReportWarning`].

mod aggregator;
pub mod merge;
mod types;

pub use aggregator::ReportAggregator;
pub use types::{
    BasicInfo, FinancialPeriodSummary, FinancialTrend, PriceTrend, Report, ReportMetadata,
    ReportOptions, ReportState, ReportWarning, SectionStatus, Sections,
};
