//! Configuration for report generation

use crate::error::{Result, StockError};
use crate::models::PriceRange;
use crate::retry::RetryPolicy;
use report_utils::{EnvError, env_duration_secs, env_parse, env_string};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_QUOTE_TTL: &str = "STOCK_REPORT_QUOTE_TTL_SECS";
pub const ENV_HISTORY_TTL_MIN: &str = "STOCK_REPORT_HISTORY_TTL_MIN_SECS";
pub const ENV_HISTORY_TTL_MAX: &str = "STOCK_REPORT_HISTORY_TTL_MAX_SECS";
pub const ENV_FINANCIAL_TTL: &str = "STOCK_REPORT_FINANCIAL_TTL_SECS";
pub const ENV_FETCH_TIMEOUT: &str = "STOCK_REPORT_FETCH_TIMEOUT_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "STOCK_REPORT_MAX_ATTEMPTS";
pub const ENV_SEC_USER_AGENT: &str = "SEC_USER_AGENT";

const DEFAULT_SEC_USER_AGENT: &str = "stock-report (stock-report@example.com)";

impl From<EnvError> for StockError {
    fn from(err: EnvError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

/// Configuration for the report aggregator and its providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Cache TTL for quotes
    pub cache_ttl_quote: Duration,

    /// History TTL for the shortest range
    pub cache_ttl_history_min: Duration,

    /// History TTL for the longest range
    pub cache_ttl_history_max: Duration,

    /// Cache TTL for financial statements
    pub cache_ttl_financial: Duration,

    /// Upper bound for a single provider call
    pub fetch_timeout: Duration,

    /// Retry policy applied to every provider call
    pub retry: RetryPolicy,

    /// User-Agent sent to SEC EDGAR
    pub sec_user_agent: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            cache_ttl_quote: Duration::from_secs(30),
            cache_ttl_history_min: Duration::from_secs(5 * 60),
            cache_ttl_history_max: Duration::from_secs(30 * 60),
            cache_ttl_financial: Duration::from_secs(24 * 60 * 60),
            fetch_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            sec_user_agent: DEFAULT_SEC_USER_AGENT.to_string(),
        }
    }
}

impl ReportConfig {
    /// Create a new configuration builder
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }

    /// Defaults overridden by whatever the environment sets
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// History TTL for `range`
    ///
    /// Interpolates linearly between the min and max TTL by the range's
    /// length, so longer (slower-moving) windows stay cached longer.
    pub fn history_ttl(&self, range: PriceRange) -> Duration {
        let shortest = PriceRange::OneMonth.days() as f64;
        let longest = PriceRange::TwoYears.days() as f64;
        let fraction = ((range.days() as f64 - shortest) / (longest - shortest)).clamp(0.0, 1.0);

        let spread = self
            .cache_ttl_history_max
            .saturating_sub(self.cache_ttl_history_min);
        self.cache_ttl_history_min + spread.mul_f64(fraction)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_history_min > self.cache_ttl_history_max {
            return Err(StockError::ConfigError(
                "cache_ttl_history_min must not exceed cache_ttl_history_max".to_string(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(StockError::ConfigError(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(StockError::ConfigError(
                "retry.max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.sec_user_agent.trim().is_empty() {
            return Err(StockError::ConfigError(
                "sec_user_agent must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for ReportConfig
#[derive(Debug, Default)]
pub struct ReportConfigBuilder {
    cache_ttl_quote: Option<Duration>,
    cache_ttl_history_min: Option<Duration>,
    cache_ttl_history_max: Option<Duration>,
    cache_ttl_financial: Option<Duration>,
    fetch_timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    max_attempts: Option<u32>,
    sec_user_agent: Option<String>,
}

impl ReportConfigBuilder {
    pub fn cache_ttl_quote(mut self, duration: Duration) -> Self {
        self.cache_ttl_quote = Some(duration);
        self
    }

    /// Set the history TTL bounds
    pub fn cache_ttl_history(mut self, min: Duration, max: Duration) -> Self {
        self.cache_ttl_history_min = Some(min);
        self.cache_ttl_history_max = Some(max);
        self
    }

    pub fn cache_ttl_financial(mut self, duration: Duration) -> Self {
        self.cache_ttl_financial = Some(duration);
        self
    }

    pub fn fetch_timeout(mut self, duration: Duration) -> Self {
        self.fetch_timeout = Some(duration);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn sec_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.sec_user_agent = Some(user_agent.into());
        self
    }

    /// Apply `STOCK_REPORT_*` and `SEC_USER_AGENT` overrides
    ///
    /// Unset variables leave the builder untouched; malformed ones fail.
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(ttl) = env_duration_secs(ENV_QUOTE_TTL)? {
            self.cache_ttl_quote = Some(ttl);
        }
        if let Some(ttl) = env_duration_secs(ENV_HISTORY_TTL_MIN)? {
            self.cache_ttl_history_min = Some(ttl);
        }
        if let Some(ttl) = env_duration_secs(ENV_HISTORY_TTL_MAX)? {
            self.cache_ttl_history_max = Some(ttl);
        }
        if let Some(ttl) = env_duration_secs(ENV_FINANCIAL_TTL)? {
            self.cache_ttl_financial = Some(ttl);
        }
        if let Some(timeout) = env_duration_secs(ENV_FETCH_TIMEOUT)? {
            self.fetch_timeout = Some(timeout);
        }
        if let Some(attempts) = env_parse::<u32>(ENV_MAX_ATTEMPTS)? {
            self.max_attempts = Some(attempts);
        }
        if let Some(user_agent) = env_string(ENV_SEC_USER_AGENT) {
            self.sec_user_agent = Some(user_agent);
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<ReportConfig> {
        let defaults = ReportConfig::default();

        let mut retry = self.retry.unwrap_or(defaults.retry);
        if let Some(attempts) = self.max_attempts {
            retry.max_attempts = attempts;
        }

        let config = ReportConfig {
            cache_ttl_quote: self.cache_ttl_quote.unwrap_or(defaults.cache_ttl_quote),
            cache_ttl_history_min: self
                .cache_ttl_history_min
                .unwrap_or(defaults.cache_ttl_history_min),
            cache_ttl_history_max: self
                .cache_ttl_history_max
                .unwrap_or(defaults.cache_ttl_history_max),
            cache_ttl_financial: self.cache_ttl_financial.unwrap_or(defaults.cache_ttl_financial),
            fetch_timeout: self.fetch_timeout.unwrap_or(defaults.fetch_timeout),
            retry,
            sec_user_agent: self.sec_user_agent.unwrap_or(defaults.sec_user_agent),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReportConfig::default();
        assert_eq!(config.cache_ttl_quote, Duration::from_secs(30));
        assert_eq!(config.cache_ttl_financial, Duration::from_secs(86_400));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ReportConfig::builder()
            .cache_ttl_quote(Duration::from_secs(5))
            .fetch_timeout(Duration::from_secs(2))
            .retry(RetryPolicy::no_retry())
            .build()
            .unwrap();

        assert_eq!(config.cache_ttl_quote, Duration::from_secs(5));
        assert_eq!(config.fetch_timeout, Duration::from_secs(2));
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn test_validation_rejects_inverted_history_bounds() {
        let result = ReportConfig::builder()
            .cache_ttl_history(Duration::from_secs(600), Duration::from_secs(60))
            .build();
        assert!(matches!(result, Err(StockError::ConfigError(_))));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let config = ReportConfig {
            fetch_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_ttl_scales_with_range() {
        let config = ReportConfig::default();

        assert_eq!(config.history_ttl(PriceRange::OneMonth), config.cache_ttl_history_min);
        assert_eq!(config.history_ttl(PriceRange::TwoYears), config.cache_ttl_history_max);

        let ttls: Vec<Duration> = PriceRange::ALL.iter().map(|r| config.history_ttl(*r)).collect();
        assert!(ttls.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_env_error_maps_to_config_error() {
        let err: StockError = EnvError {
            name: ENV_QUOTE_TTL.to_string(),
            value: "soon".to_string(),
            reason: "invalid digit".to_string(),
        }
        .into();
        assert!(matches!(err, StockError::ConfigError(ref msg) if msg.contains(ENV_QUOTE_TTL)));
    }
}
