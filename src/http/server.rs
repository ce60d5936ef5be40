//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and stop on the shutdown signal

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::handlers;
use crate::http::request::{IdGenerator, UuidGenerator};
use crate::queue::Queue;
use crate::status::StatusStore;
use crate::upstream::ResilientClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: ResilientClient,
    pub queue: Queue,
    pub statuses: Arc<dyn StatusStore>,
    pub ids: Arc<dyn IdGenerator>,
    /// Upstream URL fetched by the sync path.
    pub target: Arc<str>,
}

impl AppState {
    pub fn new(
        client: ResilientClient,
        queue: Queue,
        statuses: Arc<dyn StatusStore>,
        target: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            client,
            queue,
            statuses,
            ids: Arc::new(UuidGenerator),
            target: target.into(),
        }
    }

    /// Replace the async request id source.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }
}

/// HTTP server for the sync and async endpoints.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ProxyConfig, state: AppState) -> Self {
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/proxy", get(handlers::sync_proxy))
            .route(
                "/async-proxy",
                get(handlers::async_proxy).post(handlers::async_proxy),
            )
            .route("/requests/{id}", get(handlers::request_status))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving elsewhere or driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
