//! MLTSP API - REST layer for the experiment catalog
//!
//! Exposes the catalog, provisioning and job-tracking services of
//! `mltsp-catalog` over HTTP (Axum). Every resource route sits behind bearer
//! JWT authentication; the verified user key (email, else subject) is the caller identity handed to
//! the authorization checks.

pub mod auth;
pub mod config;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

pub use auth::{
    authenticate, generate_jwt_token, validate_jwt_token, AuthConfig, AuthContext, Claims,
};
pub use config::{ApiConfig, StoreBackend, StoreConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthExtractor, AuthMiddlewareState};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use types::*;
