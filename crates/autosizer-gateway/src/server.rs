// SPDX-FileCopyrightText: 2026 Autosizer Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::sync::Arc;

use autosizer_config::model::AutosizerConfig;
use autosizer_core::{AutosizerError, ChatInterceptor};
use autosizer_router::RequestPlanner;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers;
use crate::upstream::UpstreamClient;

/// Largest request body accepted (prompts may carry base64 images).
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Plans each model request against the budget presets.
    pub planner: Arc<RequestPlanner>,
    /// Client for the inference backend.
    pub upstream: UpstreamClient,
    /// Optional hook consulted before chat requests are planned.
    pub interceptor: Option<Arc<dyn ChatInterceptor>>,
}

impl GatewayState {
    /// Build planner and backend client from the loaded configuration.
    pub fn from_config(config: &AutosizerConfig) -> Result<Self, AutosizerError> {
        Ok(Self {
            planner: Arc::new(RequestPlanner::from_config(config)),
            upstream: UpstreamClient::new(&config.upstream)?,
            interceptor: None,
        })
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn ChatInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }
}

/// Gateway bind address (mirrors `[server]` from autosizer-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl From<&autosizer_config::model::ServerConfig> for ServerConfig {
    fn from(config: &autosizer_config::model::ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Build the gateway router.
///
/// - GET /healthz
/// - POST /api/generate, POST /api/chat (budget planned)
/// - anything else: passthrough to the backend
pub fn build_router(state: GatewayState) -> Router {
    let health_routes = Router::new().route("/healthz", get(handlers::healthz));

    let model_routes = Router::new()
        .route("/api/generate", post(handlers::post_generate))
        .route("/api/chat", post(handlers::post_chat));

    Router::new()
        .merge(health_routes)
        .merge(model_routes)
        .fallback(handlers::passthrough)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Start the gateway HTTP server and run until `shutdown` resolves.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AutosizerError> {
    let target = state.upstream.base_url().to_string();
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AutosizerError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!(%target, "Gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AutosizerError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_state_is_clone() {
        let state = GatewayState::from_config(&AutosizerConfig::default()).unwrap();
        let cloned = state.clone();
        assert!(cloned.interceptor.is_none());
        assert_eq!(cloned.upstream.base_url(), "http://ollama:11434");
    }

    #[test]
    fn server_config_mirrors_loaded_section() {
        let loaded = autosizer_config::model::ServerConfig::default();
        let config = ServerConfig::from(&loaded);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8089);
    }

    #[tokio::test]
    async fn start_server_reports_bind_failure() {
        let state = GatewayState::from_config(&AutosizerConfig::default()).unwrap();
        let config = ServerConfig {
            host: "256.0.0.1".into(),
            port: 0,
        };
        let err = start_server(&config, state, std::future::ready(()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to bind"));
    }
}
