//! API routes for the relevance engine

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::docs::source::DocumentSource;
use crate::error::SearchError;
use crate::search::{ScoredResult, SearchEngine, SearchRequest, SearchStatus};

use super::auth::SCOPE_INDEX_BUILD;
use super::middleware::AuthState;

/// Application state
pub struct AppState {
    pub engine: Arc<SearchEngine>,
    /// Where `/index/build` reads records from
    pub source: Option<Arc<dyn DocumentSource>>,
}

/// JSON error body with a status code
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub index_loaded: bool,
    pub documents: usize,
    pub generation: Option<String>,
    pub lexical_available: bool,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in_hours: i64,
}

#[derive(Deserialize)]
pub struct EmbedRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct EmbedResponse {
    pub vector: Vec<f32>,
}

/// Search results as returned over HTTP
#[derive(Serialize)]
pub struct SearchResponseBody {
    pub results: Vec<ScoredResult>,
    /// `ok`, `not_built`, `no_candidates` or `degraded`
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
}

pub async fn health_check(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let generation = app_state.engine.snapshot().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        index_loaded: generation.is_built(),
        documents: generation.len(),
        generation: generation.generation_id().map(str::to_string),
        lexical_available: generation.lexical_available(),
    })
}

/// Issue an operator token for index builds
pub async fn login(
    State(auth_state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let Some(expected) = &auth_state.operator_password else {
        warn!("Login attempted but no operator password is configured");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if payload.password.as_str() != expected.as_ref() {
        warn!("Rejected login for {}", payload.username);
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = auth_state
        .jwt_auth
        .issue(&payload.username, SCOPE_INDEX_BUILD)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        token,
        expires_in_hours: auth_state.jwt_auth.ttl_hours(),
    }))
}

pub async fn embed(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<EmbedRequest>,
) -> Result<Json<EmbedResponse>, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "text must not be empty"));
    }
    let vector = app_state.engine.embed(&payload.text).await.map_err(|e| {
        warn!("Embedding request failed: {}", e);
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
    })?;
    Ok(Json(EmbedResponse { vector }))
}

pub async fn search(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Response, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "query must not be empty"));
    }

    let response = app_state.engine.search(&request).await.map_err(|e| {
        error!("Search failed: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let (code, status, reason) = match response.status {
        SearchStatus::Ok => (StatusCode::OK, "ok", None),
        SearchStatus::NotBuilt => (StatusCode::OK, "not_built", None),
        SearchStatus::NoCandidates => (StatusCode::OK, "no_candidates", None),
        SearchStatus::Degraded { reason } => {
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", Some(reason))
        }
    };
    let body = SearchResponseBody {
        results: response.results,
        status,
        reason,
    };
    Ok((code, Json(body)).into_response())
}

/// Rebuild from the configured source and publish the new generation
pub async fn build_index(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<BuildResponse>, ApiError> {
    let source = app_state.source.as_ref().ok_or_else(|| {
        ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "no document source configured")
    })?;

    match app_state.engine.rebuild_from(source.as_ref()).await {
        Ok(report) => {
            info!(
                "Index build via API: {} indexed, {} skipped",
                report.indexed, report.skipped
            );
            Ok(Json(BuildResponse {
                status: "built",
                count: Some(report.indexed),
                skipped: Some(report.skipped),
                generation: Some(report.generation),
            }))
        }
        Err(SearchError::EmptyCorpus) => Ok(Json(BuildResponse {
            status: "empty",
            count: None,
            skipped: None,
            generation: None,
        })),
        Err(e @ SearchError::TooManyMalformed { .. }) => {
            Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => {
            error!("Index build failed: {}", e);
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
