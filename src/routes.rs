//! Route definitions for the oracle service

use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::handlers::{api_info, health_check, oracle_status};

// Status routes
pub fn status_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api", get(api_info))
        .route("/api/oracles", get(oracle_status))
}

pub fn app_router(state: AppState) -> Router {
    Router::new().merge(status_routes()).with_state(state)
}
