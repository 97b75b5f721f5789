//! Authentication middleware for Axum

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::auth::{JwtAuth, SCOPE_INDEX_BUILD};

/// Authentication state shared across requests
#[derive(Clone)]
pub struct AuthState {
    pub jwt_auth: Arc<JwtAuth>,
    /// Operator password; when unset any non-empty credentials log in
    pub operator_password: Option<Arc<str>>,
}

impl AuthState {
    pub fn new(secret: &str) -> Self {
        Self {
            jwt_auth: Arc::new(JwtAuth::new(secret)),
            operator_password: None,
        }
    }

    pub fn with_operator_password(mut self, password: Option<String>) -> Self {
        self.operator_password = password.map(Arc::from);
        self
    }
}

/// Reject requests without a valid token scoped for index builds
pub async fn require_build_scope(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = JwtAuth::bearer_token(auth_header).map_err(|_| StatusCode::UNAUTHORIZED)?;
    let claims = state.jwt_auth.verify(token).map_err(|e| {
        debug!("Rejected token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;
    if !claims.allows(SCOPE_INDEX_BUILD) {
        return Err(StatusCode::FORBIDDEN);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
