//! API router configuration.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_info, delete_value, destroy_session, get_session, health, push_flash, put_value,
    regenerate_session, take_flash, AppState,
};
use crate::middleware::{session_middleware, SessionManager};

/// Create the API router around a session manager.
pub fn create_router(manager: Arc<SessionManager>) -> Router {
    create_router_with_state(AppState::new(manager))
}

/// Create the API router with custom state.
pub fn create_router_with_state(state: AppState) -> Router {
    // Session routes
    let session_routes = Router::new()
        .route("/", get(get_session).delete(destroy_session))
        .route("/regenerate", post(regenerate_session))
        .route("/values/{key}", put(put_value).delete(delete_value));

    let flash_routes = Router::new()
        .route("/", post(push_flash))
        .route("/{kind}", get(take_flash));

    // API v1 routes, all behind the session middleware
    let api_v1 = Router::new()
        .route("/", get(api_info))
        .nest("/session", session_routes)
        .nest("/flash", flash_routes)
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.manager),
            session_middleware,
        ));

    // Build main router
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Stop accepting connections on Ctrl+C and drain in-flight requests.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            graceful_shutdown: true,
        }
    }

    pub fn without_graceful_shutdown(mut self) -> Self {
        self.graceful_shutdown = false;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 3000)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Start the API server.
pub async fn serve(config: ServerConfig, manager: Arc<SessionManager>) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router(manager);

    tracing::info!("Starting shard-session API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::error::ShardSessionError::Io)?;

    let server = axum::serve(listener, router);
    let result = if config.graceful_shutdown {
        server.with_graceful_shutdown(shutdown_signal()).await
    } else {
        server.await
    };

    result.map_err(|e| crate::error::ShardSessionError::Io(std::io::Error::other(e.to_string())))
}
