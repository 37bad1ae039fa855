//! MLTSP API Server Entry Point
//!
//! Loads configuration from the environment, opens the record store and
//! starts the Axum HTTP server.

use axum::Router;
use mltsp_api::telemetry::{init_tracing, TelemetryConfig};
use mltsp_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, AuthConfig, StoreConfig};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let store_config = StoreConfig::from_env()?;
    let store = store_config.open()?;
    tracing::info!(backend = ?store_config.backend, path = %store_config.path.display(), "Record store opened");

    let api_config = ApiConfig::from_env()?;
    let auth_config = AuthConfig::from_env();

    let app: Router = create_api_router(AppState::new(store), &api_config, auth_config)?;

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting MLTSP API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
