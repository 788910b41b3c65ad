//! SEC EDGAR financial-statement adapter
//!
//! Annual figures come from the XBRL company-facts endpoint. SEC fair access
//! allows 10 requests per second and requires a descriptive User-Agent.

use super::FinancialProvider;
use crate::error::{Result, StockError};
use crate::models::{FinancialSnapshot, FiscalPeriod};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const PROVIDER: &str = "sec";
const SEC_BASE_URL: &str = "https://data.sec.gov";
const SEC_COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const SEC_RATE_LIMIT: NonZeroU32 = match NonZeroU32::new(10) {
    Some(rate) => rate,
    None => NonZeroU32::MIN,
};

/// Every annual filing the history lookup considers
const MAX_HISTORY_YEARS: usize = 10;

/// Concepts tried in order; the first one reporting a year wins for that year
const REVENUE: &[&str] = &[
    "Revenues",
    "RevenueFromContractWithCustomerExcludingAssessedTax",
    "SalesRevenueNet",
];
const OPERATING_INCOME: &[&str] = &["OperatingIncomeLoss"];
const NET_INCOME: &[&str] = &["NetIncomeLoss", "ProfitLoss"];
const EQUITY: &[&str] = &[
    "StockholdersEquity",
    "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
];
const DIVIDENDS: &[&str] = &[
    "CommonStockDividendsPerShareDeclared",
    "CommonStockDividendsPerShareCashPaid",
];
const SHARES: &[&str] = &["EntityCommonStockSharesOutstanding"];

/// Company facts response from SEC
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyFacts {
    #[serde(rename = "entityName", default)]
    pub entity_name: String,
    pub facts: Facts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Facts {
    #[serde(rename = "us-gaap")]
    pub us_gaap: Option<Value>,
    pub dei: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct FactEntry {
    val: f64,
    end: String,
    start: Option<String>,
    fp: Option<String>,
    form: Option<String>,
    filed: String,
}

impl FactEntry {
    fn is_annual(&self) -> bool {
        let annual_form = self.form.as_deref().is_some_and(|f| f.starts_with("10-K"));
        let full_year = self.fp.as_deref().is_none_or(|fp| fp == "FY");
        annual_form && full_year && self.spans_a_year()
    }

    /// Instant facts always qualify; duration facts must cover a fiscal year
    fn spans_a_year(&self) -> bool {
        let Some(start) = &self.start else {
            return true;
        };
        match (parse_date(start), parse_date(&self.end)) {
            (Some(start), Some(end)) => (end - start).num_days() >= 300,
            _ => false,
        }
    }

    fn year(&self) -> Option<i32> {
        self.end.get(..4)?.parse().ok()
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// Annual values of a concept keyed by fiscal year, latest filing per year
fn annual_values(taxonomy: Option<&Value>, concepts: &[&str], unit: &str) -> BTreeMap<i32, f64> {
    let mut merged = BTreeMap::new();
    let Some(taxonomy) = taxonomy else {
        return merged;
    };

    for concept in concepts {
        let Some(raw) = taxonomy.get(*concept).and_then(|c| c.get("units")).and_then(|u| u.get(unit)) else {
            continue;
        };
        let Ok(entries) = serde_json::from_value::<Vec<FactEntry>>(raw.clone()) else {
            continue;
        };

        let mut latest: BTreeMap<i32, (String, f64)> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.is_annual()) {
            let Some(year) = entry.year() else { continue };
            let newer = latest.get(&year).is_none_or(|(filed, _)| entry.filed > *filed);
            if newer {
                latest.insert(year, (entry.filed.clone(), entry.val));
            }
        }
        for (year, (_, val)) in latest {
            merged.entry(year).or_insert(val);
        }
    }
    merged
}

/// Instant share counts keyed by the year they were reported in
fn share_counts(dei: Option<&Value>) -> BTreeMap<i32, f64> {
    annual_values(dei, SHARES, "shares")
}

/// Build annual snapshots from company facts, most recent first
pub fn annual_snapshots(symbol: &str, facts: &CompanyFacts, periods: usize) -> Vec<FinancialSnapshot> {
    let gaap = facts.facts.us_gaap.as_ref();
    let revenue = annual_values(gaap, REVENUE, "USD");
    let operating_income = annual_values(gaap, OPERATING_INCOME, "USD");
    let net_income = annual_values(gaap, NET_INCOME, "USD");
    let equity = annual_values(gaap, EQUITY, "USD");
    let dividends = annual_values(gaap, DIVIDENDS, "USD/shares");
    let shares = share_counts(facts.facts.dei.as_ref());

    let years: BTreeSet<i32> = revenue
        .keys()
        .chain(net_income.keys())
        .chain(equity.keys())
        .copied()
        .collect();

    years
        .into_iter()
        .rev()
        .take(periods)
        .map(|year| FinancialSnapshot {
            symbol: symbol.to_string(),
            period: FiscalPeriod::Annual(year),
            revenue: revenue.get(&year).copied(),
            operating_income: operating_income.get(&year).copied(),
            net_income: net_income.get(&year).copied(),
            equity: equity.get(&year).copied(),
            shares_outstanding: shares.get(&year).copied(),
            dividend_per_share: dividends.get(&year).copied(),
        })
        .collect()
}

/// Look a ticker up in SEC's `company_tickers.json`
fn find_cik(tickers: &Value, ticker: &str) -> Option<String> {
    tickers.as_object()?.values().find_map(|company| {
        let matches = company
            .get("ticker")
            .and_then(Value::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case(ticker));
        if !matches {
            return None;
        }
        let cik = company.get("cik_str")?;
        cik.as_u64()
            .map(|n| n.to_string())
            .or_else(|| cik.as_str().map(str::to_string))
    })
}

/// SEC EDGAR API client
#[derive(Clone)]
pub struct SecEdgarClient {
    client: Client,
    user_agent: String,
    rate_limiter: SharedRateLimiter,
}

impl SecEdgarClient {
    /// `user_agent` should name the application and a contact address
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            user_agent: user_agent.into(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(SEC_RATE_LIMIT))),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StockError::upstream(
                PROVIDER,
                format!("{url} returned {}", response.status()),
            ));
        }
        Ok(response.json().await?)
    }

    /// Get CIK number from stock ticker
    pub async fn get_cik(&self, ticker: &str) -> Result<String> {
        let tickers = self.get_json(SEC_COMPANY_TICKERS_URL).await?;
        find_cik(&tickers, ticker).ok_or_else(|| StockError::InvalidSymbol(ticker.to_string()))
    }

    /// Get company facts (XBRL financial data)
    pub async fn get_company_facts(&self, cik: &str) -> Result<CompanyFacts> {
        let cik_padded = format!("{:0>10}", cik.trim_start_matches('0'));
        let url = format!("{SEC_BASE_URL}/api/xbrl/companyfacts/CIK{cik_padded}.json");
        Ok(serde_json::from_value(self.get_json(&url).await?)?)
    }

    async fn annual_history(&self, symbol: &str, periods: usize) -> Result<Vec<FinancialSnapshot>> {
        let cik = self.get_cik(symbol).await?;
        let facts = self.get_company_facts(&cik).await?;
        let snapshots = annual_snapshots(symbol, &facts, periods);
        debug!(symbol, cik = %cik, company = %facts.entity_name, periods = snapshots.len(), "parsed company facts");
        Ok(snapshots)
    }
}

#[async_trait]
impl FinancialProvider for SecEdgarClient {
    async fn fetch_financial_snapshot(
        &self,
        symbol: &str,
        period: FiscalPeriod,
    ) -> Result<FinancialSnapshot> {
        let history = self.annual_history(symbol, MAX_HISTORY_YEARS).await?;
        let found = match period {
            FiscalPeriod::Latest => history.into_iter().next(),
            FiscalPeriod::Annual(_) => history.into_iter().find(|s| s.period == period),
        };
        found.ok_or_else(|| StockError::upstream(PROVIDER, format!("no {period} filing for {symbol}")))
    }

    async fn fetch_financial_history(
        &self,
        symbol: &str,
        periods: usize,
    ) -> Result<Vec<FinancialSnapshot>> {
        self.annual_history(symbol, periods).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn facts() -> CompanyFacts {
        serde_json::from_value(json!({
            "cik": 320193,
            "entityName": "Apple Inc.",
            "facts": {
                "dei": {
                    "EntityCommonStockSharesOutstanding": {"units": {"shares": [
                        {"val": 15_550_061_000.0, "end": "2023-10-20", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"},
                        {"val": 15_115_823_000.0, "end": "2024-10-18", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-11-01"}
                    ]}}
                },
                "us-gaap": {
                    "Revenues": {"units": {"USD": [
                        {"val": 383_285_000_000.0, "start": "2022-09-25", "end": "2023-09-30", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"},
                        {"val": 391_035_000_000.0, "start": "2023-10-01", "end": "2024-09-28", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-11-01"},
                        {"val": 94_930_000_000.0, "start": "2024-06-30", "end": "2024-09-28", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-11-01"},
                        {"val": 85_777_000_000.0, "start": "2024-03-31", "end": "2024-06-29", "fy": 2024, "fp": "Q3", "form": "10-Q", "filed": "2024-08-02"}
                    ]}},
                    "NetIncomeLoss": {"units": {"USD": [
                        {"val": 96_995_000_000.0, "start": "2022-09-25", "end": "2023-09-30", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"},
                        {"val": 93_736_000_000.0, "start": "2023-10-01", "end": "2024-09-28", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-11-01"}
                    ]}},
                    "StockholdersEquity": {"units": {"USD": [
                        {"val": 62_146_000_000.0, "end": "2023-09-30", "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-11-03"},
                        {"val": 56_950_000_000.0, "end": "2024-09-28", "fy": 2024, "fp": "FY", "form": "10-K", "filed": "2024-11-01"}
                    ]}}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_annual_snapshots_from_facts() {
        let snapshots = annual_snapshots("AAPL", &facts(), 3);

        assert_eq!(snapshots.len(), 2);
        let latest = &snapshots[0];
        assert_eq!(latest.period, FiscalPeriod::Annual(2024));
        // quarter-length and 10-Q entries are ignored
        assert_eq!(latest.revenue, Some(391_035_000_000.0));
        assert_eq!(latest.net_income, Some(93_736_000_000.0));
        assert_eq!(latest.equity, Some(56_950_000_000.0));
        assert_eq!(latest.shares_outstanding, Some(15_115_823_000.0));
        assert_eq!(latest.operating_income, None);
        assert_eq!(latest.dividend_per_share, None);

        assert_eq!(snapshots[1].period, FiscalPeriod::Annual(2023));
        assert_eq!(annual_snapshots("AAPL", &facts(), 1).len(), 1);
    }

    #[test]
    fn test_restated_value_wins() {
        let mut facts = facts();
        let gaap = facts.facts.us_gaap.as_mut().unwrap();
        gaap["NetIncomeLoss"]["units"]["USD"]
            .as_array_mut()
            .unwrap()
            .push(json!({"val": 97_000_000_000.0, "start": "2022-09-25", "end": "2023-09-30", "fy": 2024, "fp": "FY", "form": "10-K/A", "filed": "2024-12-01"}));

        let snapshots = annual_snapshots("AAPL", &facts, 3);
        assert_eq!(snapshots[1].net_income, Some(97_000_000_000.0));
    }

    #[test]
    fn test_find_cik() {
        let tickers = json!({
            "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
            "1": {"cik_str": "789019", "ticker": "MSFT", "title": "MICROSOFT CORP"}
        });
        assert_eq!(find_cik(&tickers, "aapl"), Some("320193".to_string()));
        assert_eq!(find_cik(&tickers, "MSFT"), Some("789019".to_string()));
        assert_eq!(find_cik(&tickers, "005930"), None);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_financial_history() {
        let client = SecEdgarClient::new("stock-report (stock-report@example.com)");
        let history = client.fetch_financial_history("AAPL", 3).await.unwrap();
        assert!(!history.is_empty());
        assert!(history[0].net_income.is_some());
    }
}
