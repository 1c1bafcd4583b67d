//! Shared test harness for in-memory database scenarios.
//!
//! Provides [`TestHarness`] which builds an in-memory [`ConfigSource`],
//! initializes the registry with the journal records, and hands out scopes
//! from a fresh stack. The [`with_server`](TestHarness::with_server)
//! constructor starts Axum on a random port for HTTP-level testing.
//! Everything tears down with the harness: the pools close with their last
//! handle.

use std::net::SocketAddr;
use std::sync::Arc;

use rowboat_common::ScopeStrategy;
use rowboat_db::config::ConfigSource;
use rowboat_db::registry::Registry;
use rowboat_db::scope::{ScopeStack, SessionScope};

use crate::config::Config;
use crate::journal;
use crate::server::{build_router, AppContext};

/// Test harness wrapping an initialized registry backed by an in-memory
/// database.
pub struct TestHarness {
    pub ctx: AppContext,
    pub registry: Arc<Registry>,
    pub stack: Arc<ScopeStack>,
}

impl TestHarness {
    /// Create a new harness with an in-memory, request-aware source.
    pub fn new() -> Self {
        let source = ConfigSource::builder()
            .strategy(ScopeStrategy::PerRequest)
            .build();
        Self::with_source(source)
    }

    /// Create a new harness with a custom configuration source.
    pub fn with_source(source: ConfigSource) -> Self {
        let registry = journal::build_registry(source).expect("failed to initialize registry");
        let stack = Arc::new(ScopeStack::new(registry.clone()));
        let ctx = AppContext {
            registry: Some(registry.clone()),
            config: Arc::new(Config::default()),
        };
        Self {
            ctx,
            registry,
            stack,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::serve(Self::new()).await
    }

    /// Start an Axum server with a custom source on a random port.
    pub async fn with_server_source(source: ConfigSource) -> (Self, SocketAddr) {
        Self::serve(Self::with_source(source)).await
    }

    async fn serve(harness: Self) -> (Self, SocketAddr) {
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Open a scope on the harness stack.
    pub fn scope(&self) -> Arc<SessionScope> {
        self.stack.open().expect("failed to open scope")
    }

    /// Close a scope obtained from [`scope`](Self::scope).
    pub fn close(&self, scope: Arc<SessionScope>) {
        self.stack.close(scope).expect("failed to close scope");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
