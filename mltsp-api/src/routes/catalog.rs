//! Catalog Listing Routes
//!
//! One endpoint for every listable kind. The kind is a path segment so a
//! misspelled kind reaches the handler and is rejected with 400 instead of
//! falling through to a 404.

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use mltsp_catalog::{ListQuery, Listing};
use mltsp_core::CatalogKind;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthExtractor,
    state::AppState,
    types::{CatalogListResponse, CatalogQuery},
};

/// GET /api/v1/catalog/{kind} - List projects or artifacts
#[utoipa::path(
    get,
    path = "/api/v1/catalog/{kind}",
    tag = "Catalog",
    params(
        ("kind" = String, Path, description = "projects, featuresets, models or predictions"),
        ("auth_only" = Option<bool>, Query, description = "Only records on projects the caller is authorized on (default true)"),
        ("name_only" = Option<bool>, Query, description = "Return {id, name} pairs"),
        ("by_project" = Option<String>, Query, description = "Restrict to one project key"),
        ("as_html_table_string" = Option<bool>, Query, description = "Render an HTML table"),
    ),
    responses(
        (status = 200, description = "Listing as JSON, or text/html when a table was requested", body = CatalogListResponse),
        (status = 400, description = "Unknown kind", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_catalog(
    State(state): State<AppState>,
    AuthExtractor(auth): AuthExtractor,
    Path(kind): Path<String>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Response> {
    let kind: CatalogKind = kind.parse()?;
    let query: ListQuery = query.into();

    let response = match state.catalog.list_kind(kind, &auth.user_key, &query)? {
        Listing::Table(html) => Html(html).into_response(),
        Listing::Names(names) => listing_json(kind, to_values(&names)?),
        Listing::Records(items) => listing_json(kind, items),
    };
    Ok(response)
}

/// Encode response items. A failure here is ours, not the caller's.
fn to_values<T: Serialize>(items: &[T]) -> ApiResult<Vec<Value>> {
    items
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to encode listing");
            ApiError::internal_error("Failed to encode listing")
        })
}

fn listing_json(kind: CatalogKind, items: Vec<Value>) -> Response {
    Json(CatalogListResponse {
        kind,
        count: items.len(),
        items,
    })
    .into_response()
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/:kind", get(list_catalog))
}
