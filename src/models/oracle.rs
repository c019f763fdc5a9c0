use std::fmt;
use std::str::FromStr;

use ethers::types::{H160, U256};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// 20-byte account address. Displayed as lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(H160);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(H160(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        self.0.as_fixed_bytes()
    }
}

impl From<H160> for Address {
    fn from(address: H160) -> Self {
        Self(address)
    }
}

impl From<Address> for H160 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(ModelError::InvalidAddress(raw.to_string()));
        }
        H160::from_str(digits)
            .map(Self)
            .map_err(|_| ModelError::InvalidAddress(raw.to_string()))
    }
}

impl TryFrom<String> for Address {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An account that acts as one oracle. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OracleIdentity(Address);

impl OracleIdentity {
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

impl FromStr for OracleIdentity {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.parse().map(Self)
    }
}

impl fmt::Display for OracleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Canonical form of an oracle index.
///
/// Indexes reach us as ABI words (`getMyIndexes`, `OracleRequest` logs), as
/// decimal strings and as hex quantities. All of them are normalised to this
/// type before any comparison happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OracleIndex(u8);

impl OracleIndex {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for OracleIndex {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl FromStr for OracleIndex {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(digits) => u8::from_str_radix(digits, 16),
            None => trimmed.parse::<u8>(),
        };

        parsed
            .map(Self)
            .map_err(|_| ModelError::InvalidIndex(raw.to_string()))
    }
}

impl fmt::Display for OracleIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The three distinct indexes the contract assigned to one oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexAssignment([OracleIndex; 3]);

impl IndexAssignment {
    pub fn new(indexes: [OracleIndex; 3]) -> Result<Self, ModelError> {
        let [a, b, c] = indexes;
        if a == b || a == c || b == c {
            return Err(ModelError::DuplicateIndex([a.0, b.0, c.0]));
        }
        Ok(Self(indexes))
    }

    pub fn contains(&self, index: OracleIndex) -> bool {
        self.0.contains(&index)
    }

    pub fn indexes(&self) -> [OracleIndex; 3] {
        self.0
    }
}

impl TryFrom<[u8; 3]> for IndexAssignment {
    type Error = ModelError;

    fn try_from(raw: [u8; 3]) -> Result<Self, Self::Error> {
        Self::new(raw.map(OracleIndex))
    }
}

impl fmt::Display for IndexAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "[{a}, {b}, {c}]")
    }
}

/// Flight status codes understood by the FlightSurety contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum StatusCode {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl StatusCode {
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        StatusCode::ALL
            .into_iter()
            .find(|status| status.code() == code)
            .ok_or(ModelError::UnknownStatusCode(code))
    }
}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.code().fmt(f)
    }
}

/// Amount in wei. Opaque to this service; only forwarded as payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Wei(pub u128);

impl From<Wei> for U256 {
    fn from(amount: Wei) -> Self {
        U256::from(amount.0)
    }
}

impl TryFrom<U256> for Wei {
    type Error = ModelError;

    fn try_from(amount: U256) -> Result<Self, Self::Error> {
        if amount > U256::from(u128::MAX) {
            return Err(ModelError::AmountOverflow(amount.to_string()));
        }
        Ok(Self(amount.as_u128()))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} wei", self.0)
    }
}

/// A decoded `OracleRequest` event: "what is the status of this flight".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRequestEvent {
    pub index: OracleIndex,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<u64>,
}

/// One oracle's answer to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub oracle: OracleIdentity,
    pub index: OracleIndex,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub status: StatusCode,
}

impl StatusResponse {
    pub fn for_event(oracle: OracleIdentity, event: &StatusRequestEvent, status: StatusCode) -> Self {
        Self {
            oracle,
            index: event.index,
            airline: event.airline,
            flight: event.flight.clone(),
            timestamp: event.timestamp,
            status,
        }
    }
}
