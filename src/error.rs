//! Error types for the oracle service

use std::time::Duration;

use ethers::providers::{ProviderError, RpcError};
use thiserror::Error;

use crate::models::oracle::OracleIdentity;

/// Failure of a single call to the remote authority (the chain node and the
/// FlightSurety contracts behind it).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[source] ProviderError),

    #[error("http client setup failed: {0}")]
    Client(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode remote response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Network-level failures worth retrying. Reverts are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport(_) | RemoteError::Timeout(_))
    }
}

impl From<ProviderError> for RemoteError {
    fn from(err: ProviderError) -> Self {
        if let Some(response) = err.as_error_response() {
            if response.message.to_ascii_lowercase().contains("revert") {
                return RemoteError::Reverted(response.message.clone());
            }
            return RemoteError::Rpc {
                code: response.code,
                message: response.message.clone(),
            };
        }
        if err.as_serde_error().is_some() {
            return RemoteError::Decode(err.to_string());
        }
        RemoteError::Transport(err)
    }
}

impl From<ModelError> for RemoteError {
    fn from(err: ModelError) -> Self {
        RemoteError::Decode(err.to_string())
    }
}

/// Violations of the domain types' invariants.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid address {0:?}")]
    InvalidAddress(String),

    #[error("invalid oracle index {0:?}")]
    InvalidIndex(String),

    #[error("index assignment must hold 3 distinct indexes, got {0:?}")]
    DuplicateIndex([u8; 3]),

    #[error("unknown status code {0}")]
    UnknownStatusCode(u8),

    #[error("amount {0} does not fit in 128 bits")]
    AmountOverflow(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("oracle {0} is already registered")]
    DuplicateIdentity(OracleIdentity),

    #[error("registry has already been published")]
    AlreadyPublished,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("registration fee unavailable: {0}")]
    FeeUnavailable(#[source] RemoteError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
