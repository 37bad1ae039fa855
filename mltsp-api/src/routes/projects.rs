//! Project REST API Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use mltsp_catalog::NewProject;
use mltsp_core::{CatalogKind, Project};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::AppState,
    types::{KeyResponse, ProjectNamesResponse},
};

/// POST /api/v1/projects - Create a project owned by the caller
#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "Projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Project created", body = KeyResponse),
        (status = 400, description = "Invalid request", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Json(req): Json<NewProject>,
) -> ApiResult<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }

    let key = state.provisioner.add_project(&auth.user_key, req)?;
    Ok((StatusCode::CREATED, Json(KeyResponse { key })))
}

/// GET /api/v1/projects/names - Names of the caller's projects
#[utoipa::path(
    get,
    path = "/api/v1/projects/names",
    tag = "Projects",
    responses(
        (status = 200, description = "Project names", body = ProjectNamesResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_project_names(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
) -> ApiResult<impl IntoResponse> {
    let list = state.catalog.project_names(&auth.user_key)?;
    Ok(Json(ProjectNamesResponse { list }))
}

/// GET /api/v1/projects/{key} - Get a project
#[utoipa::path(
    get,
    path = "/api/v1/projects/{key}",
    tag = "Projects",
    params(
        ("key" = String, Path, description = "Project key")
    ),
    responses(
        (status = 200, description = "Project details", body = Project),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let project: Project = state.catalog.get_visible(&auth.user_key, &key)?;
    Ok(Json(project))
}

/// DELETE /api/v1/projects/{key} - Delete a project and revoke its grants
#[utoipa::path(
    delete,
    path = "/api/v1/projects/{key}",
    tag = "Projects",
    params(
        ("key" = String, Path, description = "Project key")
    ),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "Project not found", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_project(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state
        .catalog
        .visible_project_key(CatalogKind::Projects, &auth.user_key, &key)?;
    state.provisioner.remove_project(&key)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_project))
        .route("/names", get(list_project_names))
        .route("/:key", get(get_project).delete(delete_project))
}
