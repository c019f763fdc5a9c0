//! Service configuration, loaded from the environment

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

pub mod contracts;
pub mod oracle;

pub use contracts::ContractsConfig;
pub use oracle::OracleConfig;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:8000";

#[derive(Clone, Debug)]
pub struct Config {
    pub contracts: ContractsConfig,
    pub oracle: OracleConfig,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            contracts: ContractsConfig::from_vars(&lookup)?,
            oracle: OracleConfig::from_vars(&lookup)?,
            port: parse_var(&lookup, "PORT", DEFAULT_PORT)?,
            cors_allowed_origins,
        })
    }
}

/// Parse `var` if it is set and non-empty, otherwise fall back to `default`.
pub(crate) fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match parse_optional_var(lookup, var)? {
        Some(value) => Ok(value),
        None => Ok(default),
    }
}

pub(crate) fn parse_optional_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err: T::Err| ConfigError::Invalid {
                var,
                value: raw.clone(),
                reason: err.to_string(),
            }),
        _ => Ok(None),
    }
}
