//! FlightSurety Oracle Server
//!
//! Registers the configured oracle accounts with the FlightSuretyApp contract,
//! then answers its `OracleRequest` events for as long as the process runs. A
//! small read-only HTTP API reports liveness and the registered oracles.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flightsurety_oracles::app_state::AppState;
use flightsurety_oracles::config::Config;
use flightsurety_oracles::node::OracleNode;
use flightsurety_oracles::routes;
use flightsurety_oracles::services::remote_authority::{JsonRpcAuthority, RemoteAuthority};
use flightsurety_oracles::services::status_policy::policy_for;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("flightsurety_oracles=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let authority: Arc<dyn RemoteAuthority> = Arc::new(
        JsonRpcAuthority::new(&config.contracts, &config.oracle)
            .context("failed to build chain node client")?,
    );
    let node = Arc::new(OracleNode::new(
        authority,
        config.oracle.clone(),
        policy_for(config.oracle.fixed_status_code),
    ));

    // Without an account pool there is nothing to register; treat it as an
    // unreachable remote authority.
    let account_pool = node
        .account_pool()
        .await
        .context("failed to obtain oracle account pool from the chain node")?;
    info!(
        accounts = account_pool.len(),
        app = %config.contracts.app_address,
        rpc_url = %config.contracts.rpc_url,
        "starting oracle node"
    );

    let state = AppState::new(node.gate(), node.stats());

    // Bootstrap oracles, then serve status requests under supervision.
    tokio::spawn(node.run(account_pool));

    let app = routes::app_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.cors_allowed_origins));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("http server failed")?;

    Ok(())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allowed_origins = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}
