//! Technical indicators computed from a price series
//!
//! Every indicator that lacks enough history resolves to `None` (`N/A` on the
//! wire) instead of being computed over a shorter window.

use crate::error::{Result, StockError};
use crate::models::{PriceSeries, na, na_label};
use serde::{Deserialize, Serialize};
use std::fmt;
use ta::Next;
use ta::indicators::SimpleMovingAverage;
use tracing::debug;

pub const MA_SHORT: usize = 5;
pub const MA_MID: usize = 20;
pub const MA_LONG: usize = 60;

/// Recent window compared against the whole series' volume
pub const VOLUME_WINDOW: usize = 5;

/// Lookbacks used by [`IndicatorEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub bollinger_period: usize,
    /// Band half-width in standard deviations
    pub bollinger_width: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            bollinger_period: 20,
            bollinger_width: 2.0,
        }
    }
}

/// RSI interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RsiSignal {
    #[serde(rename = "과매수")]
    Overbought,
    #[serde(rename = "과매도")]
    Oversold,
    #[serde(rename = "중립")]
    Neutral,
}

impl RsiSignal {
    pub fn from_rsi(rsi: f64) -> Self {
        if rsi >= 70.0 {
            Self::Overbought
        } else if rsi <= 30.0 {
            Self::Oversold
        } else {
            Self::Neutral
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Overbought => "과매수",
            Self::Oversold => "과매도",
            Self::Neutral => "중립",
        }
    }
}

/// Short-term trend label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "상승")]
    Up,
    #[serde(rename = "하락")]
    Down,
    #[serde(rename = "횡보")]
    Sideways,
}

impl Trend {
    /// Classify from the latest close and the two shorter averages
    pub fn classify(close: f64, ma5: f64, ma20: f64) -> Self {
        if close > ma5 && ma5 > ma20 {
            Self::Up
        } else if close < ma5 && ma5 < ma20 {
            Self::Down
        } else {
            Self::Sideways
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Up => "상승",
            Self::Down => "하락",
            Self::Sideways => "횡보",
        }
    }
}

/// Where the latest close sits relative to the Bollinger envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandPosition {
    #[serde(rename = "상단")]
    Upper,
    #[serde(rename = "중간")]
    Middle,
    #[serde(rename = "하단")]
    Lower,
}

impl BandPosition {
    pub fn locate(close: f64, upper: f64, lower: f64) -> Self {
        if close >= upper {
            Self::Upper
        } else if close <= lower {
            Self::Lower
        } else {
            Self::Middle
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Upper => "상단",
            Self::Middle => "중간",
            Self::Lower => "하단",
        }
    }
}

impl fmt::Display for RsiSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for BandPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Indicators for one series at its latest bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    #[serde(with = "na")]
    pub ma5: Option<f64>,
    #[serde(with = "na")]
    pub ma20: Option<f64>,
    #[serde(with = "na")]
    pub ma60: Option<f64>,
    #[serde(with = "na")]
    pub rsi: Option<f64>,
    #[serde(with = "na_label")]
    pub rsi_signal: Option<RsiSignal>,
    #[serde(with = "na")]
    pub bollinger_upper: Option<f64>,
    #[serde(with = "na")]
    pub bollinger_middle: Option<f64>,
    #[serde(with = "na")]
    pub bollinger_lower: Option<f64>,
    #[serde(with = "na_label")]
    pub bollinger_position: Option<BandPosition>,
    #[serde(with = "na_label")]
    pub trend: Option<Trend>,
    #[serde(with = "na")]
    pub volume_avg_5d: Option<f64>,
    /// Mean volume over the whole series
    #[serde(with = "na")]
    pub volume_avg: Option<f64>,
    /// Recent volume against the overall mean, percent
    #[serde(with = "na")]
    pub volume_change_pct: Option<f64>,
}

impl IndicatorSet {
    /// Set with every indicator absent
    pub fn unavailable() -> Self {
        Self {
            ma5: None,
            ma20: None,
            ma60: None,
            rsi: None,
            rsi_signal: None,
            bollinger_upper: None,
            bollinger_middle: None,
            bollinger_lower: None,
            bollinger_position: None,
            trend: None,
            volume_avg_5d: None,
            volume_avg: None,
            volume_change_pct: None,
        }
    }

    /// Whether every field could be computed
    pub fn is_complete(&self) -> bool {
        self.ma60.is_some() && self.rsi.is_some() && self.bollinger_upper.is_some() && self.trend.is_some()
    }
}

/// Simple moving average of the last `window` closes
pub fn moving_average(closes: &[f64], window: usize) -> Option<f64> {
    if window == 0 || closes.len() < window {
        return None;
    }
    let mut sma = SimpleMovingAverage::new(window).ok()?;
    let mut value = None;
    for &close in &closes[closes.len() - window..] {
        value = Some(sma.next(close));
    }
    value
}

/// RSI over the last `period` day-over-day deltas
///
/// Gains and losses are averaged over the full window (zero for days that
/// moved the other way). A window with no losses reads 100, a window with no
/// movement at all reads 50.
pub fn relative_strength_index(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let window = &closes[closes.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 { (g + delta, l) } else { (g, l - delta) }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Sample standard deviation of the last `window` closes
pub fn sample_std_dev(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 || closes.len() < window {
        return None;
    }
    let tail = &closes[closes.len() - window..];
    let mean = tail.iter().sum::<f64>() / window as f64;
    let variance = tail.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
    Some(variance.sqrt())
}

/// `(recent mean, overall mean, change %)` of traded volume
///
/// The change is `N/A` when the series never traded.
pub fn volume_profile(volumes: &[f64], window: usize) -> Option<(f64, f64, Option<f64>)> {
    let recent = moving_average(volumes, window)?;
    let overall = volumes.iter().sum::<f64>() / volumes.len() as f64;
    let change = (overall > 0.0).then(|| (recent / overall - 1.0) * 100.0);
    Some((recent, overall, change))
}

/// Bollinger envelope `(upper, middle, lower)`
pub fn bollinger_bands(closes: &[f64], period: usize, width: f64) -> Option<(f64, f64, f64)> {
    let middle = moving_average(closes, period)?;
    let sigma = sample_std_dev(closes, period)?;
    Some((middle + width * sigma, middle, middle - width * sigma))
}

/// Pure indicator computation over a [`PriceSeries`]
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Compute the full [`IndicatorSet`] at the series' last bar
    pub fn compute(&self, series: &PriceSeries) -> Result<IndicatorSet> {
        series.validate()?;
        if self.params.rsi_period == 0 || self.params.bollinger_period < 2 {
            return Err(StockError::InvalidInput(format!(
                "indicator lookbacks out of range: {:?}",
                self.params
            )));
        }

        let closes = series.closes();
        let Some(&close) = closes.last() else {
            return Ok(IndicatorSet::unavailable());
        };

        let ma5 = moving_average(&closes, MA_SHORT);
        let ma20 = moving_average(&closes, MA_MID);
        let ma60 = moving_average(&closes, MA_LONG);
        let rsi = relative_strength_index(&closes, self.params.rsi_period);
        let bands = bollinger_bands(&closes, self.params.bollinger_period, self.params.bollinger_width);
        let volumes: Vec<f64> = series.bars().iter().map(|b| b.volume as f64).collect();
        let volume = volume_profile(&volumes, VOLUME_WINDOW);

        let set = IndicatorSet {
            ma5,
            ma20,
            ma60,
            rsi,
            rsi_signal: rsi.map(RsiSignal::from_rsi),
            bollinger_upper: bands.map(|b| b.0),
            bollinger_middle: bands.map(|b| b.1),
            bollinger_lower: bands.map(|b| b.2),
            bollinger_position: bands.map(|(upper, _, lower)| BandPosition::locate(close, upper, lower)),
            trend: ma5.zip(ma20).map(|(short, mid)| Trend::classify(close, short, mid)),
            volume_avg_5d: volume.map(|v| v.0),
            volume_avg: volume.map(|v| v.1),
            volume_change_pct: volume.and_then(|v| v.2),
        };

        debug!(
            symbol = %series.symbol,
            bars = closes.len(),
            complete = set.is_complete(),
            "computed indicators"
        );

        Ok(set)
    }
}
