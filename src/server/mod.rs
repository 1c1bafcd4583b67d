//! HTTP server wiring: the shared application context and the router.

use std::sync::Arc;

use axum::{
    http::{header, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use rowboat_common::{Error, Result};
use rowboat_db::registry::Registry;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;

pub mod routes_posts;
pub mod scope;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    /// The initialized registry; `None` in deployments that don't use the
    /// persistence layer (the scope middleware then passes requests through
    /// untouched).
    pub registry: Option<Arc<Registry>>,
    pub config: Arc<Config>,
}

impl AppContext {
    /// The registry, or the not-initialized error for handlers that need it.
    pub fn registry(&self) -> Result<&Arc<Registry>> {
        self.registry.as_ref().ok_or(Error::NotInitialized)
    }
}

/// Create the Axum router with all routes
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // One session scope per request around every /api route.
    let api = routes_posts::journal_routes().layer(middleware::from_fn_with_state(
        ctx.clone(),
        scope::scope_middleware,
    ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config, registry: Arc<Registry>) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let ctx = AppContext {
        registry: Some(registry),
        config: Arc::new(config),
    };
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Failed to install ctrl-c handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_accessor() {
        let ctx = AppContext {
            registry: None,
            config: Arc::new(Config::default()),
        };
        assert!(matches!(ctx.registry(), Err(Error::NotInitialized)));

        let registry = crate::journal::build_registry(
            rowboat_db::config::ConfigSource::in_memory(),
        )
        .unwrap();
        let ctx = AppContext {
            registry: Some(registry),
            config: Arc::new(Config::default()),
        };
        assert!(ctx.registry().is_ok());
    }
}
