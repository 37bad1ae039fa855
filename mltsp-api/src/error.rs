//! HTTP error responses.
//!
//! Every failing handler returns an [`ApiError`], rendered as a JSON body
//! `{ "code": "...", "message": "...", "details": ... }` with the status
//! derived from its [`ErrorCode`]. Domain errors from the catalog and the
//! record store convert through `?`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mltsp_core::{MltspError, StorageError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable failure category, serialized in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No bearer token on a protected route
    Unauthorized,
    /// Bearer token failed decoding or signature checks
    InvalidToken,
    TokenExpired,

    ValidationFailed,
    InvalidInput,
    MissingField,
    /// `kind` path or query segment outside projects/featuresets/models/predictions
    UnknownKind,

    /// Absent, or owned by a project the caller cannot see
    EntityNotFound,
    EntityAlreadyExists,

    InternalError,
    StorageError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        use ErrorCode::*;
        match self {
            Unauthorized | InvalidToken | TokenExpired => StatusCode::UNAUTHORIZED,
            ValidationFailed | InvalidInput | MissingField | UnknownKind => {
                StatusCode::BAD_REQUEST
            }
            EntityNotFound => StatusCode::NOT_FOUND,
            EntityAlreadyExists => StatusCode::CONFLICT,
            InternalError | StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message used when a caller supplies none.
    pub fn default_message(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            Unauthorized => "Bearer token required",
            InvalidToken => "Bearer token rejected",
            TokenExpired => "Bearer token expired",
            ValidationFailed => "Request rejected by catalog validation",
            InvalidInput => "Malformed request",
            MissingField => "A required field was not supplied",
            UnknownKind => "Resource kind not recognized",
            EntityNotFound => "No such record",
            EntityAlreadyExists => "Key already in use",
            InternalError => "Unexpected server failure",
            StorageError => "Record store unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(self, details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            ..self
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidToken, message)
    }

    pub fn token_expired() -> Self {
        Self::from_code(ErrorCode::TokenExpired)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorCode::MissingField, format!("`{field}` must be supplied"))
            .with_details(serde_json::json!({ "field": field }))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EntityNotFound, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::RequiredFieldMissing { field } => ApiError::missing_field(&field),
            ValidationError::UnknownKind { .. } => {
                ApiError::new(ErrorCode::UnknownKind, err.to_string())
            }
            ValidationError::InvalidValue { .. } | ValidationError::PayloadMismatch { .. } => {
                ApiError::validation_failed(err.to_string())
            }
        }
    }
}

/// Not-found and validation failures pass their message through. Storage
/// backend failures are logged in full and reported generically.
impl From<MltspError> for ApiError {
    fn from(err: MltspError) -> Self {
        match err {
            MltspError::Validation(e) => e.into(),
            MltspError::Storage(StorageError::NotFound { collection, key }) => {
                ApiError::not_found(format!("{} record {} not found", collection, key))
            }
            MltspError::Storage(StorageError::AlreadyExists { collection, key }) => {
                ApiError::new(
                    ErrorCode::EntityAlreadyExists,
                    format!("{} record {} already exists", collection, key),
                )
            }
            MltspError::Storage(StorageError::Rejected { collection, reason }) => {
                ApiError::validation_failed(format!("Rejected by {}: {}", collection, reason))
            }
            MltspError::Storage(e @ StorageError::Corrupt { .. }) => {
                tracing::error!(error = %e, "Stored record failed to decode");
                ApiError::from_code(ErrorCode::StorageError)
            }
            MltspError::Storage(e) => {
                tracing::error!(error = %e, "Record store error");
                ApiError::from_code(ErrorCode::StorageError)
            }
            MltspError::Config(e) => {
                tracing::error!(error = %e, "Configuration error");
                ApiError::internal_error("Server configuration error")
            }
            MltspError::Probe(e) => {
                tracing::error!(error = %e, "Unexpected liveness probe error");
                ApiError::internal_error("Liveness probe failed")
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!(error = %err, "Rejected request body");
        ApiError::invalid_input(format!("Body is not valid JSON: {}", err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
