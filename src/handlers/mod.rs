//! API handlers for the oracle service

pub mod status;

pub use status::{api_info, health_check, oracle_status};
