//! Artifact REST API Routes
//!
//! Feature sets, models and predictions share one router shape, mounted
//! once per kind. The kind travels to the handlers as a request extension.
//!
//! Every route checks that the caller holds an active grant on the owning
//! project. A record the caller may not see answers 404, never 403.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use mltsp_catalog::{JobReport, NewFeatureSet, NewModel, NewPrediction};
use mltsp_core::JobKind;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::AppState,
    types::{AttachPidRequest, KeyResponse, RecordFailureRequest, RecordResultsRequest},
};

/// Reject with 404 unless the caller may write into `projkey`.
fn require_project_access(state: &AppState, caller: &str, projkey: &str) -> ApiResult<()> {
    if projkey.trim().is_empty() {
        return Err(ApiError::missing_field("projkey"));
    }
    if !state.authz.is_authorized(caller, projkey)? {
        tracing::debug!(caller, projkey, "Caller has no grant on project");
        return Err(ApiError::not_found(format!("Project {} not found", projkey)));
    }
    Ok(())
}

/// Reject with 404 unless the caller may see the record.
fn require_visible(state: &AppState, caller: &str, kind: JobKind, key: &str) -> ApiResult<()> {
    state
        .catalog
        .visible_project_key(kind.catalog_kind(), caller, key)?;
    Ok(())
}

// ============================================================================
// CREATE
// ============================================================================

/// POST /api/v1/featuresets - Register a feature set
#[utoipa::path(
    post,
    path = "/api/v1/featuresets",
    tag = "Artifacts",
    request_body = NewFeatureSet,
    responses(
        (status = 201, description = "Feature set created", body = KeyResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_featureset(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<NewFeatureSet>,
) -> ApiResult<impl IntoResponse> {
    require_project_access(&state, &auth.user_key, &req.projkey)?;
    let key = state.provisioner.add_featureset(req)?;
    Ok((StatusCode::CREATED, Json(KeyResponse { key })))
}

/// POST /api/v1/models - Register a model trained on a feature set
#[utoipa::path(
    post,
    path = "/api/v1/models",
    tag = "Artifacts",
    request_body = NewModel,
    responses(
        (status = 201, description = "Model created", body = KeyResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Project or feature set not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_model(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<NewModel>,
) -> ApiResult<impl IntoResponse> {
    require_project_access(&state, &auth.user_key, &req.projkey)?;
    let key = state.provisioner.add_model(&auth.user_key, req)?;
    Ok((StatusCode::CREATED, Json(KeyResponse { key })))
}

/// POST /api/v1/predictions - Register a prediction
#[utoipa::path(
    post,
    path = "/api/v1/predictions",
    tag = "Artifacts",
    request_body = NewPrediction,
    responses(
        (status = 201, description = "Prediction created", body = KeyResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 404, description = "Project or model not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_prediction(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<NewPrediction>,
) -> ApiResult<impl IntoResponse> {
    require_project_access(&state, &auth.user_key, &req.projkey)?;
    let key = state.provisioner.add_prediction(&auth.user_key, req)?;
    Ok((StatusCode::CREATED, Json(KeyResponse { key })))
}

// ============================================================================
// READ AND DELETE
// ============================================================================

/// GET /api/v1/{kind}/{key} - Get an artifact
#[utoipa::path(
    get,
    path = "/api/v1/{kind}/{key}",
    tag = "Artifacts",
    params(
        ("kind" = String, Path, description = "featuresets, models or predictions"),
        ("key" = String, Path, description = "Record key")
    ),
    responses(
        (status = 200, description = "The stored record"),
        (status = 404, description = "Record not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_artifact(
    State(state): State<AppState>,
    Extension(kind): Extension<JobKind>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let record = state
        .catalog
        .get_visible_kind(kind.catalog_kind(), &auth.user_key, &key)?;
    Ok(Json(record))
}

/// DELETE /api/v1/{kind}/{key} - Delete an artifact
#[utoipa::path(
    delete,
    path = "/api/v1/{kind}/{key}",
    tag = "Artifacts",
    params(
        ("kind" = String, Path, description = "featuresets, models or predictions"),
        ("key" = String, Path, description = "Record key")
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "Record not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_artifact(
    State(state): State<AppState>,
    Extension(kind): Extension<JobKind>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_visible(&state, &auth.user_key, kind, &key)?;
    state.provisioner.remove_artifact(kind.catalog_kind(), &key)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// JOB UPDATES
// ============================================================================

/// POST /api/v1/{kind}/{key}/pid - Attach the worker's process id
#[utoipa::path(
    post,
    path = "/api/v1/{kind}/{key}/pid",
    tag = "Artifacts",
    params(
        ("kind" = String, Path, description = "featuresets, models or predictions"),
        ("key" = String, Path, description = "Record key")
    ),
    request_body = AttachPidRequest,
    responses(
        (status = 204, description = "Process id stored"),
        (status = 400, description = "Empty pid", body = ApiError),
        (status = 404, description = "Record not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn attach_pid(
    State(state): State<AppState>,
    Extension(kind): Extension<JobKind>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
    Json(req): Json<AttachPidRequest>,
) -> ApiResult<impl IntoResponse> {
    require_visible(&state, &auth.user_key, kind, &key)?;
    state.jobs.attach_process_id(kind, &key, &req.pid)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/{kind}/{key}/results - Store the job's results
#[utoipa::path(
    post,
    path = "/api/v1/{kind}/{key}/results",
    tag = "Artifacts",
    params(
        ("kind" = String, Path, description = "featuresets, models or predictions"),
        ("key" = String, Path, description = "Record key")
    ),
    request_body = RecordResultsRequest,
    responses(
        (status = 204, description = "Results stored"),
        (status = 400, description = "Payload does not match the kind", body = ApiError),
        (status = 404, description = "Record not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn record_results(
    State(state): State<AppState>,
    Extension(kind): Extension<JobKind>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
    Json(req): Json<RecordResultsRequest>,
) -> ApiResult<impl IntoResponse> {
    require_visible(&state, &auth.user_key, kind, &key)?;
    let (payload, err_msg) = req.into_parts()?;
    state.jobs.record_success(kind, &key, payload, err_msg)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/{kind}/{key}/error - Store the job's failure
#[utoipa::path(
    post,
    path = "/api/v1/{kind}/{key}/error",
    tag = "Artifacts",
    params(
        ("kind" = String, Path, description = "featuresets, models or predictions"),
        ("key" = String, Path, description = "Record key")
    ),
    request_body = RecordFailureRequest,
    responses(
        (status = 204, description = "Failure stored"),
        (status = 404, description = "Record not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn record_failure(
    State(state): State<AppState>,
    Extension(kind): Extension<JobKind>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
    Json(req): Json<RecordFailureRequest>,
) -> ApiResult<impl IntoResponse> {
    require_visible(&state, &auth.user_key, kind, &key)?;
    state.jobs.record_failure(kind, &key, req.err_msg)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/{kind}/{key}/stage - Derived stage, plus liveness while running
#[utoipa::path(
    get,
    path = "/api/v1/{kind}/{key}/stage",
    tag = "Artifacts",
    params(
        ("kind" = String, Path, description = "featuresets, models or predictions"),
        ("key" = String, Path, description = "Record key")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = JobReport),
        (status = 404, description = "Record not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn job_stage(
    State(state): State<AppState>,
    Extension(kind): Extension<JobKind>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_visible(&state, &auth.user_key, kind, &key)?;
    let jobs = state.jobs.clone();
    let report = tokio::task::spawn_blocking(move || jobs.probe_record(kind, &key))
        .await
        .map_err(|e| ApiError::internal_error(format!("Liveness probe panicked: {}", e)))??;
    Ok(Json(report))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Router for one artifact kind, to be nested under its collection path.
pub fn create_router(kind: JobKind) -> Router<AppState> {
    let create = match kind {
        JobKind::FeatureSet => post(create_featureset),
        JobKind::Model => post(create_model),
        JobKind::Prediction => post(create_prediction),
    };

    Router::new()
        .route("/", create)
        .route("/:key", get(get_artifact).delete(delete_artifact))
        .route("/:key/pid", post(attach_pid))
        .route("/:key/results", post(record_results))
        .route("/:key/error", post(record_failure))
        .route("/:key/stage", get(job_stage))
        .layer(Extension(kind))
}
