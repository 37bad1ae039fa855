//! REST API Routes Module
//!
//! Route handlers organized by resource:
//! - Catalog listings (one endpoint, kind in the path)
//! - Projects
//! - Feature sets, models and predictions, including job updates
//! - Job liveness probe
//! - Health check endpoints (public)
//! - OpenAPI document (public)

pub mod artifacts;
pub mod catalog;
pub mod health;
pub mod jobs;
pub mod projects;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use mltsp_core::JobKind;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub use catalog::create_router as catalog_router;
pub use health::create_router as health_router;
pub use jobs::create_router as jobs_router;
pub use projects::create_router as projects_router;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set MLTSP_CORS_ORIGINS.",
        ));
    }
    Ok(())
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Build the CORS layer from ApiConfig.
///
/// In development mode (empty origins), allows all origins.
/// In production mode, only allows configured origins.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any).expose_headers(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Resource routes mounted under `/api/v1`. All require authentication.
fn build_resource_routes() -> Router<AppState> {
    Router::new()
        .nest("/catalog", catalog::create_router())
        .nest("/projects", projects::create_router())
        .nest("/featuresets", artifacts::create_router(JobKind::FeatureSet))
        .nest("/models", artifacts::create_router(JobKind::Model))
        .nest("/predictions", artifacts::create_router(JobKind::Prediction))
        .nest("/jobs", jobs::create_router())
}

/// Create the complete API router.
///
/// - Resource routes under /api/v1/* (bearer JWT required)
/// - Health checks at /health/* (public)
/// - OpenAPI document at /openapi.json (public)
///
/// In production the auth and CORS settings are validated first and a
/// router is only returned when both are safe.
pub fn create_api_router(
    state: AppState,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    if api_config.is_production() {
        auth_config.validate_for_production()?;
        validate_api_config_for_production(api_config)?;
    }

    let auth_state = AuthMiddlewareState::new(auth_config, state.provisioner.clone());
    let api_routes =
        build_resource_routes().layer(from_fn_with_state(auth_state, auth_middleware));

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router())
        .route("/openapi.json", get(openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config))
        .with_state(state);

    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_cors_origins() {
        let config = ApiConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(validate_api_config_for_production(&config).is_err());

        let config = ApiConfig {
            environment: "production".to_string(),
            cors_origins: vec!["https://mltsp.example.org".to_string()],
            ..Default::default()
        };
        assert!(validate_api_config_for_production(&config).is_ok());
    }
}
