//! Data models for the FlightSurety oracle service

use serde::{Deserialize, Serialize};

pub mod oracle;

pub use oracle::{
    Address, IndexAssignment, OracleIdentity, OracleIndex, StatusCode,
    StatusRequestEvent, StatusResponse, Wei,
};

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}
