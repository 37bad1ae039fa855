//! Job Status REST API Routes
//!
//! Liveness probe for an arbitrary process id. The answer says nothing
//! about any stored record; per-record stages live under the artifact routes.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use mltsp_catalog::ProcessId;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    types::{JobStatusResponse, PidQuery},
};

/// GET|POST /api/v1/jobs/status?pid=N - Is the process still running?
#[utoipa::path(
    get,
    path = "/api/v1/jobs/status",
    tag = "Jobs",
    params(
        ("pid" = String, Query, description = "Process id to probe; `PID` is accepted too")
    ),
    responses(
        (status = 200, description = "Liveness of the process", body = JobStatusResponse),
        (status = 400, description = "Missing pid", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<PidQuery>,
) -> ApiResult<impl IntoResponse> {
    let raw = query.pid.trim().to_string();
    if raw.is_empty() {
        return Err(ApiError::missing_field("pid"));
    }

    let jobs = state.jobs.clone();
    let probe_pid = raw.clone();
    let status = tokio::task::spawn_blocking(move || jobs.job_status_of(&probe_pid))
        .await
        .map_err(|e| ApiError::internal_error(format!("Liveness probe panicked: {}", e)))?;

    let pid = match raw.parse::<i64>() {
        Ok(n) => ProcessId::Number(n),
        Err(_) => ProcessId::Text(raw),
    };
    tracing::debug!(%pid, %status, "Job status probed");
    Ok(Json(JobStatusResponse { pid, status }))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/status", get(job_status).post(job_status))
}
