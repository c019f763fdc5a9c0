//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::{DateTime, Utc};

use crate::registry::RegistryGate;
use crate::services::dispatcher::DispatchStats;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gate: RegistryGate,
    pub stats: Arc<DispatchStats>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(gate: RegistryGate, stats: Arc<DispatchStats>) -> Self {
        Self {
            gate,
            stats,
            started_at: Utc::now(),
        }
    }
}

impl FromRef<AppState> for RegistryGate {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for Arc<DispatchStats> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.stats.clone()
    }
}
