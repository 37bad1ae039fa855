//! Health Check Endpoints
//!
//! - /health/ping - pong
//! - /health/live - the process is up
//! - /health/ready - every collection is readable and the pid probe works
//!
//! No authentication.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use mltsp_core::Collection;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    fn of(ok: bool) -> Self {
        if ok {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ReadinessDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReadinessDetails {
    pub store: StoreHealth,
    /// Whether the liveness probe recognizes this server's own pid
    pub pid_probe: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Record counts per collection, or the first failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StoreHealth {
    pub status: HealthStatus,
    pub records: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn check_store(state: &AppState) -> StoreHealth {
    let mut records = BTreeMap::new();
    for collection in Collection::ALL {
        match state.store.count(collection) {
            Ok(n) => {
                records.insert(collection.to_string(), n);
            }
            Err(e) => {
                tracing::warn!(%collection, error = %e, "Readiness: collection unreadable");
                return StoreHealth {
                    status: HealthStatus::Unhealthy,
                    records,
                    error: Some(format!("{}: {}", collection, e)),
                };
            }
        }
    }
    StoreHealth {
        status: HealthStatus::Healthy,
        records,
        error: None,
    }
}

/// GET /health/ping
#[utoipa::path(
    get,
    path = "/health/ping",
    tag = "Health",
    responses((status = 200, description = "pong", body = String)),
)]
pub async fn ping() -> impl IntoResponse {
    "pong"
}

/// GET /health/live
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is up", body = HealthResponse)),
)]
pub async fn liveness() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        details: None,
    })
}

/// GET /health/ready
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to serve", body = HealthResponse),
        (status = 503, description = "Store or probe failing", body = HealthResponse),
    ),
)]
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store = check_store(&state);
    let pid_probe = HealthStatus::of(state.jobs.is_running(i64::from(std::process::id())));

    let ready = store.status == HealthStatus::Healthy && pid_probe == HealthStatus::Healthy;
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = HealthResponse {
        status: HealthStatus::of(ready),
        details: Some(ReadinessDetails {
            store,
            pid_probe,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };
    (code, Json(body))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
}
