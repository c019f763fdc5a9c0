use reqwest::Url;

use crate::error::ConfigError;
use crate::models::Address;

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Where the FlightSurety contracts live.
#[derive(Clone, Debug)]
pub struct ContractsConfig {
    pub rpc_url: Url,
    pub app_address: Address,
}

impl ContractsConfig {
    pub fn from_vars(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let rpc_url = match super::parse_optional_var::<Url>(lookup, "ETH_RPC_URL")? {
            Some(url) => url,
            None => Url::parse(DEFAULT_RPC_URL).map_err(|err| ConfigError::Invalid {
                var: "ETH_RPC_URL",
                value: DEFAULT_RPC_URL.to_string(),
                reason: err.to_string(),
            })?,
        };

        let app_address = super::parse_optional_var(lookup, "FLIGHT_SURETY_APP_ADDRESS")?
            .ok_or(ConfigError::Missing("FLIGHT_SURETY_APP_ADDRESS"))?;

        Ok(Self {
            rpc_url,
            app_address,
        })
    }
}
