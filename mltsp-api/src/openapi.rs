//! OpenAPI document for the MLTSP API
//!
//! Generated by utoipa from the route annotations and the schema derives on
//! the request, response and record types.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::{artifacts, catalog, health, jobs, projects};
use crate::types::*;

use mltsp_catalog::{
    JobReport, NamedKey, NewFeatureSet, NewModel, NewPrediction, NewProject, ProcessId,
};
use mltsp_core::{
    AuthorizationGrant, CatalogKind, FeatureSet, GrantFlag, JobKind, JobStage, JobStatus, Model,
    Prediction, Project, User,
};

/// OpenAPI document for the MLTSP API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "MLTSP API",
        version = "0.1.0",
        description = "Experiment catalog for time-series feature sets, models and predictions",
        license(name = "BSD-3-Clause", url = "https://opensource.org/licenses/BSD-3-Clause")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Catalog", description = "Authorization-gated listings of projects and artifacts"),
        (name = "Projects", description = "Projects and their access grants"),
        (name = "Artifacts", description = "Feature sets, models and predictions with their job state"),
        (name = "Jobs", description = "Liveness of external worker processes"),
        (name = "Health", description = "Service health checks"),
    ),
    paths(
        // Catalog
        catalog::list_catalog,
        // Projects
        projects::create_project,
        projects::list_project_names,
        projects::get_project,
        projects::delete_project,
        // Artifacts
        artifacts::create_featureset,
        artifacts::create_model,
        artifacts::create_prediction,
        artifacts::get_artifact,
        artifacts::delete_artifact,
        artifacts::attach_pid,
        artifacts::record_results,
        artifacts::record_failure,
        artifacts::job_stage,
        // Jobs
        jobs::job_status,
        // Health
        health::ping,
        health::liveness,
        health::readiness,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,
            // === Records ===
            Project, User, AuthorizationGrant, FeatureSet, Model, Prediction,
            // === Enums ===
            CatalogKind, JobKind, JobStage, JobStatus, GrantFlag,
            // === Requests ===
            NewProject, NewFeatureSet, NewModel, NewPrediction,
            AttachPidRequest, RecordResultsRequest, RecordFailureRequest,
            // === Responses ===
            KeyResponse, ProjectNamesResponse, CatalogListResponse, NamedKey,
            JobStatusResponse, JobReport, ProcessId,
            health::HealthResponse, health::HealthStatus, health::ReadinessDetails,
            health::StoreHealth,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
