//! Data model shared by the engines, the aggregator and the providers

use crate::error::{Result, StockError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serde adapter writing absent metrics as the string `"N/A"`
///
/// Used as `#[serde(with = "crate::models::na")]` on `Option<f64>` fields so
/// that downstream formatters see the same sentinel for every missing value,
/// while Rust code keeps the absent/zero distinction in the type.
pub mod na {
    use serde::{Deserialize, Deserializer, Serializer};

    pub const NOT_AVAILABLE: &str = "N/A";

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) if v.is_finite() => serializer.serialize_f64(*v),
            _ => serializer.serialize_str(NOT_AVAILABLE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            Some(Raw::Number(v)) => Ok(Some(v)),
            Some(Raw::Text(s)) if s == NOT_AVAILABLE => Ok(None),
            Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// [`na`] for optional labels: the label's own serialization or `"N/A"`
pub mod na_label {
    use super::na::NOT_AVAILABLE;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(v) => v.serialize(serializer),
            None => serializer.serialize_str(NOT_AVAILABLE),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<T> {
            Label(T),
            Missing(String),
        }

        match Option::<Raw<T>>::deserialize(deserializer)? {
            Some(Raw::Label(v)) => Ok(Some(v)),
            Some(Raw::Missing(s)) if s == NOT_AVAILABLE => Ok(None),
            Some(Raw::Missing(s)) => Err(serde::de::Error::custom(format!("unknown label {s}"))),
            None => Ok(None),
        }
    }
}

/// Round to `places` decimal places, keeping `N/A` as is
pub fn round_to(value: Option<f64>, places: i32) -> Option<f64> {
    let factor = 10f64.powi(places);
    value.map(|v| (v * factor).round() / factor)
}

/// One OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Chronological bars for one symbol
///
/// The series is never reordered or deduplicated after construction;
/// [`PriceSeries::validate`] rejects malformed input instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Check ordering and value sanity
    ///
    /// Timestamps must be strictly increasing; gaps are fine.
    pub fn validate(&self) -> Result<()> {
        for (i, bar) in self.bars.iter().enumerate() {
            if !bar.close.is_finite() || bar.close < 0.0 {
                return Err(StockError::integrity(
                    &self.symbol,
                    format!("bar {i} has invalid close {}", bar.close),
                ));
            }
            if i == 0 {
                continue;
            }
            let prev = &self.bars[i - 1];
            if bar.timestamp == prev.timestamp {
                return Err(StockError::integrity(
                    &self.symbol,
                    format!("duplicate timestamp {}", bar.timestamp.format("%Y-%m-%d %H:%M")),
                ));
            }
            if bar.timestamp < prev.timestamp {
                return Err(StockError::integrity(
                    &self.symbol,
                    format!(
                        "timestamp {} precedes {}",
                        bar.timestamp.format("%Y-%m-%d %H:%M"),
                        prev.timestamp.format("%Y-%m-%d %H:%M")
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Requested history window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriceRange {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
}

impl PriceRange {
    pub const ALL: [Self; 5] = [
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
    ];

    /// Calendar days covered by the range
    pub fn days(self) -> i64 {
        match self {
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
            Self::OneYear => 365,
            Self::TwoYears => 730,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PriceRange {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StockError::InvalidInput(format!("Invalid range: {s}")))
    }
}

/// Latest quote from a market-data provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: Option<String>,
    pub price: f64,
    pub change: f64,
    pub change_pct: f64,
    pub volume: u64,
}

impl Quote {
    /// Derive a quote from the last two bars of a series
    ///
    /// With a single bar the change is zero; an empty series has no quote.
    pub fn from_series(series: &PriceSeries) -> Option<Self> {
        let bars = series.bars();
        let last = bars.last()?;
        let previous = bars.len().checked_sub(2).map_or(last.close, |i| bars[i].close);
        let change = last.close - previous;
        let change_pct = if previous > 0.0 {
            change / previous * 100.0
        } else {
            0.0
        };

        Some(Self {
            symbol: series.symbol.clone(),
            name: None,
            price: last.close,
            change,
            change_pct,
            volume: last.volume,
        })
    }
}

/// Fiscal period of a financial statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FiscalPeriod {
    /// Most recent period the provider has
    Latest,
    /// Full fiscal year
    Annual(i32),
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Annual(year) => write!(f, "FY{year}"),
        }
    }
}

/// Financial statement figures for one period; absent fields stay `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub symbol: String,
    pub period: FiscalPeriod,
    pub revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub equity: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub dividend_per_share: Option<f64>,
}

impl FinancialSnapshot {
    /// Snapshot with every figure absent
    pub fn empty(symbol: impl Into<String>, period: FiscalPeriod) -> Self {
        Self {
            symbol: symbol.into(),
            period,
            revenue: None,
            operating_income: None,
            net_income: None,
            equity: None,
            shares_outstanding: None,
            dividend_per_share: None,
        }
    }
}

/// Position held at the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSnapshot {
    pub symbol: String,
    pub name: Option<String>,
    pub quantity: u64,
    pub avg_price: f64,
    /// Broker's last price, if it reported one
    pub current_price: Option<f64>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Daily bars starting 2024-01-02, one per calendar day
    pub fn daily_series(symbol: &str, closes: &[f64]) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: start + chrono::Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000 + i as u64,
            })
            .collect();
        PriceSeries::new(symbol, bars)
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::daily_series;
    use super::*;
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Wrapped {
        #[serde(with = "na")]
        value: Option<f64>,
    }

    #[test]
    fn test_na_serialization() {
        let present = serde_json::to_value(Wrapped { value: Some(1.5) }).unwrap();
        let absent = serde_json::to_value(Wrapped { value: None }).unwrap();
        assert_eq!(present, json!({"value": 1.5}));
        assert_eq!(absent, json!({"value": "N/A"}));

        let back: Wrapped = serde_json::from_value(json!({"value": "N/A"})).unwrap();
        assert_eq!(back.value, None);
        let back: Wrapped = serde_json::from_value(json!({"value": 0.0})).unwrap();
        assert_eq!(back.value, Some(0.0));
    }

    #[test]
    fn test_validate_accepts_gaps() {
        let mut series = daily_series("AAPL", &[1.0, 2.0, 3.0]);
        series.bars[2].timestamp += chrono::Duration::days(3);
        assert!(series.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_disorder() {
        let mut dup = daily_series("AAPL", &[1.0, 2.0, 3.0]);
        dup.bars[2].timestamp = dup.bars[1].timestamp;
        assert!(matches!(dup.validate(), Err(StockError::DataIntegrity { .. })));

        let mut unordered = daily_series("AAPL", &[1.0, 2.0, 3.0]);
        unordered.bars.swap(0, 2);
        let err = unordered.validate().unwrap_err();
        assert!(err.to_string().contains("precedes"));
        // never repaired in place
        assert_eq!(unordered.bars()[0].close, 3.0);
    }

    #[test]
    fn test_quote_from_series() {
        let quote = Quote::from_series(&daily_series("AAPL", &[100.0, 110.0])).unwrap();
        assert_eq!(quote.price, 110.0);
        assert_eq!(quote.change, 10.0);
        assert!((quote.change_pct - 10.0).abs() < 1e-9);
        assert_eq!(quote.volume, 1_001);

        let single = Quote::from_series(&daily_series("AAPL", &[100.0])).unwrap();
        assert_eq!(single.change, 0.0);
        assert!(Quote::from_series(&daily_series("AAPL", &[])).is_none());
    }

    #[test]
    fn test_price_range_parsing() {
        assert_eq!("3mo".parse::<PriceRange>().unwrap(), PriceRange::ThreeMonths);
        assert_eq!("1Y".parse::<PriceRange>().unwrap(), PriceRange::OneYear);
        assert!("10y".parse::<PriceRange>().is_err());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(Some(1.23456), 2), Some(1.23));
        assert_eq!(round_to(None, 2), None);
    }
}
