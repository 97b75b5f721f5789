//! API server for the relevance engine

use anyhow::{Context, Result};
use axum::{
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use crate::docs::source::DocumentSource;
use crate::search::SearchEngine;

use super::middleware::{require_build_scope, AuthState};
use super::routes::{build_index, embed, health_check, login, search, AppState};

/// Configuration for the API server
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub operator_password: Option<String>,
    /// Origins allowed by CORS; `*` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            jwt_secret: std::env::var("JWT_SECRET").unwrap_or_else(|_| ephemeral_secret()),
            operator_password: None,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Random per-process signing secret; tokens signed with it die with the process
pub fn ephemeral_secret() -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    engine: Arc<SearchEngine>,
    source: Option<Arc<dyn DocumentSource>>,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, engine: Arc<SearchEngine>) -> Self {
        Self {
            config,
            engine,
            source: None,
        }
    }

    /// Source used by `POST /index/build`
    pub fn with_source(mut self, source: Arc<dyn DocumentSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        let app_state = Arc::new(AppState {
            engine: Arc::clone(&self.engine),
            source: self.source.clone(),
        });
        let auth_state = AuthState::new(&self.config.jwt_secret)
            .with_operator_password(self.config.operator_password.clone());

        Router::new()
            // Public routes
            .route("/login", post(login))
            .with_state(auth_state.clone())
            .route("/health", get(health_check))
            .route("/embed", post(embed))
            .route("/search", post(search))
            // Operator routes
            .route(
                "/index/build",
                post(build_index)
                    .route_layer(from_fn_with_state(auth_state, require_build_scope)),
            )
            .with_state(app_state)
            .layer(ServiceBuilder::new().layer(cors_layer(&self.config.allowed_origins)))
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if origins.iter().any(|origin| origin.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

