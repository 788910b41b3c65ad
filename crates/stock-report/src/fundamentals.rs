//! Valuation ratios derived from a price and a financial snapshot

use crate::models::{FinancialSnapshot, na};
use serde::{Deserialize, Serialize};

/// Per-share and valuation ratios; each field is independently `N/A`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSet {
    #[serde(with = "na")]
    pub per: Option<f64>,
    #[serde(with = "na")]
    pub pbr: Option<f64>,
    /// Return on equity in percent
    #[serde(with = "na")]
    pub roe: Option<f64>,
    #[serde(with = "na")]
    pub eps: Option<f64>,
    #[serde(with = "na")]
    pub bps: Option<f64>,
    /// Dividend yield in percent
    #[serde(with = "na")]
    pub dividend_yield: Option<f64>,
    #[serde(with = "na")]
    pub dividend_per_share: Option<f64>,
}

impl FundamentalSet {
    /// Every ratio `N/A`, used when no snapshot could be fetched
    pub fn unavailable() -> Self {
        Self {
            per: None,
            pbr: None,
            roe: None,
            eps: None,
            bps: None,
            dividend_yield: None,
            dividend_per_share: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        [
            self.per,
            self.pbr,
            self.roe,
            self.eps,
            self.bps,
            self.dividend_yield,
        ]
        .iter()
        .all(Option::is_some)
    }
}

/// Divide, yielding `None` for a zero or non-finite result
fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    Some(n / d).filter(|v| v.is_finite())
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// Pure computation of [`FundamentalSet`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FundamentalEngine;

impl FundamentalEngine {
    pub fn new() -> Self {
        Self
    }

    /// Compute every ratio that its own operands allow
    ///
    /// A missing operand only invalidates the formulas that use it.
    pub fn compute(&self, price: f64, snapshot: &FinancialSnapshot) -> FundamentalSet {
        let price = Some(price).filter(|p| p.is_finite() && *p > 0.0);
        let shares = positive(snapshot.shares_outstanding);

        let eps = ratio(snapshot.net_income, shares);
        let bps = ratio(snapshot.equity, shares);

        FundamentalSet {
            per: ratio(price, positive(eps)),
            pbr: ratio(price, positive(bps)),
            roe: ratio(snapshot.net_income, positive(snapshot.equity)).map(|r| r * 100.0),
            eps,
            bps,
            dividend_yield: ratio(snapshot.dividend_per_share, price).map(|r| r * 100.0),
            dividend_per_share: snapshot.dividend_per_share,
        }
    }
}
