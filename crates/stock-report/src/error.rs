//! Error types for report and calculator operations

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the analytics core and its collaborators
///
/// The enum is `Clone` so a single failed upstream fetch can be handed to every
/// caller waiting on the same in-flight request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    /// Price series is malformed (unordered or duplicated timestamps, bad values)
    #[error("Data integrity error for {symbol}: {reason}")]
    DataIntegrity { symbol: String, reason: String },

    /// Provider call failed
    #[error("Upstream fetch from {provider} failed: {reason}")]
    UpstreamFetch { provider: String, reason: String },

    /// Provider call did not finish in time
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// Caller supplied an unusable value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Target average price cannot be reached by buying more
    #[error("Unreachable target: {0}")]
    UnreachableTarget(String),

    /// Broker reports no position for the symbol
    #[error("No holding for {0}")]
    NotHolding(String),

    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl StockError {
    /// Shorthand for an [`StockError::UpstreamFetch`] error
    pub fn upstream(provider: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamFetch {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a [`StockError::DataIntegrity`] error
    pub fn integrity(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataIntegrity {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Whether repeating the same call may succeed
    ///
    /// Input and data-quality defects are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamFetch { .. } | Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for StockError {
    fn from(err: reqwest::Error) -> Self {
        Self::upstream("http", err)
    }
}

impl From<serde_json::Error> for StockError {
    fn from(err: serde_json::Error) -> Self {
        Self::upstream("json", err)
    }
}

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;
