use std::time::Duration;

use crate::config::{parse_optional_var, parse_var};
use crate::error::ConfigError;
use crate::models::{OracleIdentity, StatusCode};

const DEFAULT_ORACLE_COUNT: usize = 10;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_MAX_BLOCK_RANGE: u64 = 500;
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 15;
const DEFAULT_REGISTRATION_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_REGISTRATION_CONCURRENCY: usize = 4;
const DEFAULT_REGISTRATION_GAS: u64 = 3_000_000;
const DEFAULT_RESPONSE_GAS: u64 = 300_000;

/// Oracle bootstrap, listening and response settings.
#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub oracle_count: usize,
    /// Explicit account pool. `None` means "ask the node".
    pub accounts: Option<Vec<OracleIdentity>>,
    pub from_block: u64,
    pub poll_interval: Duration,
    pub max_block_range: u64,
    pub call_timeout: Duration,
    pub registration_max_attempts: u32,
    pub registration_concurrency: usize,
    pub registration_gas: u64,
    pub response_gas: u64,
    pub fixed_status_code: Option<StatusCode>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            oracle_count: DEFAULT_ORACLE_COUNT,
            accounts: None,
            from_block: 0,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
            registration_max_attempts: DEFAULT_REGISTRATION_MAX_ATTEMPTS,
            registration_concurrency: DEFAULT_REGISTRATION_CONCURRENCY,
            registration_gas: DEFAULT_REGISTRATION_GAS,
            response_gas: DEFAULT_RESPONSE_GAS,
            fixed_status_code: None,
        }
    }
}

impl OracleConfig {
    pub fn from_vars(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let accounts = match lookup("ORACLE_ACCOUNTS").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(parse_accounts(&raw)?),
            None => None,
        };

        let fixed_status_code = match parse_optional_var::<u8>(lookup, "ORACLE_FIXED_STATUS_CODE")? {
            Some(code) => Some(StatusCode::try_from(code).map_err(|err| ConfigError::Invalid {
                var: "ORACLE_FIXED_STATUS_CODE",
                value: code.to_string(),
                reason: err.to_string(),
            })?),
            None => None,
        };

        let max_block_range: u64 = parse_var(lookup, "ORACLE_MAX_BLOCK_RANGE", DEFAULT_MAX_BLOCK_RANGE)?;
        let registration_max_attempts: u32 = parse_var(
            lookup,
            "REGISTRATION_MAX_ATTEMPTS",
            DEFAULT_REGISTRATION_MAX_ATTEMPTS,
        )?;
        let registration_concurrency: usize = parse_var(
            lookup,
            "REGISTRATION_CONCURRENCY",
            DEFAULT_REGISTRATION_CONCURRENCY,
        )?;

        Ok(Self {
            oracle_count: parse_var(lookup, "ORACLE_COUNT", DEFAULT_ORACLE_COUNT)?,
            accounts,
            from_block: parse_var(lookup, "ORACLE_FROM_BLOCK", 0)?,
            poll_interval: Duration::from_millis(parse_var(
                lookup,
                "ORACLE_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )?),
            max_block_range: max_block_range.max(1),
            call_timeout: Duration::from_secs(parse_var(
                lookup,
                "REMOTE_CALL_TIMEOUT_SECS",
                DEFAULT_CALL_TIMEOUT_SECS,
            )?),
            registration_max_attempts: registration_max_attempts.max(1),
            registration_concurrency: registration_concurrency.max(1),
            registration_gas: parse_var(lookup, "REGISTRATION_GAS", DEFAULT_REGISTRATION_GAS)?,
            response_gas: parse_var(lookup, "RESPONSE_GAS", DEFAULT_RESPONSE_GAS)?,
            fixed_status_code,
        })
    }
}

fn parse_accounts(raw: &str) -> Result<Vec<OracleIdentity>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|account| !account.is_empty())
        .map(|account| {
            account.parse().map_err(|err: crate::error::ModelError| ConfigError::Invalid {
                var: "ORACLE_ACCOUNTS",
                value: account.to_string(),
                reason: err.to_string(),
            })
        })
        .collect()
}
