//! Read-only status endpoints. No business logic lives here.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::models::ApiResponse;
use crate::registry::{RegistryEntry, RegistryGate};
use crate::services::dispatcher::{DispatchStats, DispatchStatsSnapshot};

#[derive(Debug, Serialize)]
pub struct OracleStatus {
    pub ready: bool,
    pub oracle_count: usize,
    pub oracles: Vec<RegistryEntry>,
    pub dispatch: DispatchStatsSnapshot,
}

pub async fn api_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "FlightSurety oracle service",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at,
    }))
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn oracle_status(
    State(gate): State<RegistryGate>,
    State(stats): State<Arc<DispatchStats>>,
) -> Json<ApiResponse<OracleStatus>> {
    let registry = gate.current();
    let oracles = registry
        .as_ref()
        .map(|registry| registry.snapshot())
        .unwrap_or_default();

    Json(ApiResponse::ok(OracleStatus {
        ready: registry.is_some(),
        oracle_count: oracles.len(),
        oracles,
        dispatch: stats.snapshot(),
    }))
}
