//! Bearer authentication layer.
//!
//! [`auth_middleware`] runs in front of every `/api/v1` route. It resolves
//! the caller from the `Authorization` header, provisions their user record
//! on first sight, and stores the resulting [`AuthContext`] in the request
//! extensions for [`AuthExtractor`] to pick up.

use crate::auth::{authenticate, AuthConfig, AuthContext};
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use mltsp_catalog::Provisioner;
use std::sync::Arc;

/// State handed to [`auth_middleware`] via `from_fn_with_state`.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
    pub provisioner: Provisioner,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig, provisioner: Provisioner) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
            provisioner,
        }
    }
}

/// Rejects with 401 before the handler runs when the caller cannot be
/// resolved. Provisioning failures surface as store errors.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let caller = authenticate(&state.auth_config, header)?;

    state.provisioner.ensure_user(&caller.user_key)?;
    tracing::debug!(user = %caller.user_key, "Authenticated request");

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

/// The caller resolved by [`auth_middleware`]. Routes outside that layer
/// fail extraction with 500.
#[derive(Debug, Clone)]
pub struct AuthExtractor(pub AuthContext);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthExtractor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthContext>() {
            Some(caller) => Ok(AuthExtractor(caller.clone())),
            None => {
                tracing::error!(path = %parts.uri.path(), "Route is missing the auth layer");
                Err(ApiError::internal_error("Caller identity unavailable"))
            }
        }
    }
}

impl std::ops::Deref for AuthExtractor {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
