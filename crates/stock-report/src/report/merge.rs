//! Deterministic assembly of report sections from fetched data

use super::types::{
    BasicInfo, FinancialPeriodSummary, FinancialTrend, PriceTrend, Report, ReportMetadata,
    ReportOptions, ReportWarning, SectionStatus, Sections,
};
use crate::fundamentals::FundamentalSet;
use crate::indicators::IndicatorSet;
use crate::models::{FinancialSnapshot, PriceSeries, Quote, round_to};
use chrono::{DateTime, Datelike, Utc};

/// Trading-day lookbacks for the 1m/3m/1y returns
pub const RETURN_WINDOWS: (usize, usize, usize) = (20, 60, 240);

/// Bars in the 52-week band
pub const WEEKS_52_BARS: usize = 252;

fn pct_change(from: f64, to: f64) -> Option<f64> {
    (from > 0.0 && from.is_finite() && to.is_finite()).then(|| (to / from - 1.0) * 100.0)
}

/// Return over the last `bars` bars; needs `bars + 1` closes
fn trailing_return(closes: &[f64], bars: usize) -> Option<f64> {
    let last = *closes.last()?;
    let base = closes.len().checked_sub(bars + 1).map(|i| closes[i])?;
    pct_change(base, last)
}

pub fn price_trend(series: &PriceSeries) -> PriceTrend {
    let closes = series.closes();
    let bars = series.bars();
    let last = bars.last();
    let close = last.map(|b| b.close);

    let return_ytd = last.and_then(|last| {
        let year = last.timestamp.year();
        let first = bars.iter().find(|b| b.timestamp.year() == year)?;
        pct_change(first.close, last.close)
    });

    let window = &bars[bars.len().saturating_sub(WEEKS_52_BARS)..];
    let high_52w = window.iter().map(|b| b.high).reduce(f64::max);
    let low_52w = window.iter().map(|b| b.low).reduce(f64::min);

    let (short, mid, long) = RETURN_WINDOWS;
    PriceTrend {
        return_1m: round_to(trailing_return(&closes, short), 2),
        return_3m: round_to(trailing_return(&closes, mid), 2),
        return_1y: round_to(trailing_return(&closes, long), 2),
        return_ytd: round_to(return_ytd, 2),
        high_52w,
        low_52w,
        from_high_pct: round_to(high_52w.zip(close).and_then(|(h, c)| pct_change(h, c)), 2),
        from_low_pct: round_to(low_52w.zip(close).and_then(|(l, c)| pct_change(l, c)), 2),
    }
}

pub fn basic_info(quote: &Quote, latest: Option<&FinancialSnapshot>) -> BasicInfo {
    let shares = latest
        .and_then(|s| s.shares_outstanding)
        .filter(|s| *s > 0.0);

    BasicInfo {
        symbol: quote.symbol.clone(),
        name: quote.name.clone(),
        current_price: quote.price,
        price_change: quote.change,
        price_change_pct: round_to(Some(quote.change_pct), 2).unwrap_or_default(),
        volume: quote.volume,
        market_cap: shares.map(|s| s * quote.price),
    }
}

/// Annual rows with margin and year-over-year growth
///
/// `history` is most recent first; growth compares each row with the next.
pub fn financial_trend(history: &[FinancialSnapshot]) -> FinancialTrend {
    let periods = history
        .iter()
        .enumerate()
        .map(|(i, snapshot)| {
            let previous = history.get(i + 1).and_then(|p| p.revenue);
            let revenue_growth = snapshot
                .revenue
                .zip(previous)
                .filter(|(_, prev)| *prev != 0.0)
                .map(|(rev, prev)| (rev - prev) / prev.abs() * 100.0);
            let operating_margin = snapshot
                .operating_income
                .zip(snapshot.revenue.filter(|r| *r > 0.0))
                .map(|(op, rev)| op / rev * 100.0);

            FinancialPeriodSummary {
                period: snapshot.period,
                revenue: snapshot.revenue,
                operating_income: snapshot.operating_income,
                net_income: snapshot.net_income,
                operating_margin: round_to(operating_margin, 2),
                revenue_growth: round_to(revenue_growth, 2),
            }
        })
        .collect();

    FinancialTrend { periods }
}

/// Everything the merge step needs, already fetched and computed
pub struct MergeInputs<'a> {
    pub symbol: &'a str,
    pub options: &'a ReportOptions,
    pub series: &'a PriceSeries,
    /// Quote, and whether it came from the price series instead of the provider
    pub quote: (Quote, bool),
    pub technical: IndicatorSet,
    pub metrics: FundamentalSet,
    /// Annual history when financials were obtainable
    pub financials: Option<&'a [FinancialSnapshot]>,
    pub warnings: Vec<ReportWarning>,
    pub generated_at: DateTime<Utc>,
}

/// Combine computed parts into the canonical [`Report`]
///
/// Pure: the output depends only on `inputs`.
pub fn merge(inputs: MergeInputs<'_>) -> Report {
    let (quote, fell_back) = inputs.quote;
    let latest = inputs.financials.and_then(<[FinancialSnapshot]>::first);
    let has_financials = latest.is_some();

    let basic = basic_info(&quote, latest);
    let price_trend = price_trend(inputs.series);
    let financial_trend = inputs.financials.filter(|h| !h.is_empty()).map(financial_trend);

    let sections = Sections {
        basic: SectionStatus::from_completeness(!fell_back && basic.market_cap.is_some()),
        price_trend: SectionStatus::from_completeness(price_trend.is_complete()),
        metrics: SectionStatus::from_completeness(has_financials && inputs.metrics.is_complete()),
        technical: SectionStatus::from_completeness(inputs.technical.is_complete()),
        financial_trend: if financial_trend.is_some() {
            SectionStatus::Complete
        } else {
            SectionStatus::Omitted
        },
    };

    Report {
        metadata: ReportMetadata {
            symbol: inputs.symbol.to_string(),
            generated_at: inputs.generated_at,
            as_of: inputs
                .series
                .last()
                .map_or(inputs.generated_at, |bar| bar.timestamp),
            range: inputs.options.range,
            has_financials,
            warnings: inputs.warnings,
        },
        basic,
        price_trend,
        metrics: inputs.metrics,
        technical: inputs.technical,
        financial_trend,
        sections,
    }
}
