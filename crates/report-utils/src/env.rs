//! Typed lookups of configuration values from the environment

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Error raised when an environment variable is set but unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {name}: {value:?} ({reason})")]
pub struct EnvError {
    pub name: String,
    pub value: String,
    pub reason: String,
}

/// Read a non-empty string variable
pub fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable, `Ok(None)` when it is unset or blank
pub fn env_parse<T>(name: &str) -> Result<Option<T>, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(name).map(|raw| parse_value(name, &raw)).transpose()
}

/// Read a whole number of seconds as a [`Duration`]
pub fn env_duration_secs(name: &str) -> Result<Option<Duration>, EnvError> {
    Ok(env_parse::<u64>(name)?.map(Duration::from_secs))
}

fn parse_value<T>(name: &str, raw: &str) -> Result<T, EnvError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| EnvError {
        name: name.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_trims_whitespace() {
        let secs: u64 = parse_value("TTL", " 30 ").unwrap();
        assert_eq!(secs, 30);
    }

    #[test]
    fn test_parse_value_reports_name_and_value() {
        let err = parse_value::<u64>("STOCK_REPORT_QUOTE_TTL_SECS", "soon").unwrap_err();
        assert_eq!(err.name, "STOCK_REPORT_QUOTE_TTL_SECS");
        assert_eq!(err.value, "soon");
        assert!(err.to_string().contains("STOCK_REPORT_QUOTE_TTL_SECS"));
    }

    #[test]
    fn test_unset_variable_is_none() {
        let value = env_duration_secs("REPORT_UTILS_SURELY_UNSET_VARIABLE_42").unwrap();
        assert!(value.is_none());
        assert!(env_string("REPORT_UTILS_SURELY_UNSET_VARIABLE_42").is_none());
    }
}
