//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the dispatcher as its only handler
//! - Wire up middleware (tracing, request ID)
//! - Bind server to listener and stop on the shutdown broadcast
//!
//! # Design Decisions
//! - Timeout and body limit are enforced in `dispatch`, not by tower layers,
//!   so clients always get the JSON envelope

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::handlers::HandlerContext;
use crate::http::dispatch::dispatch;
use crate::http::middleware::MiddlewareChain;
use crate::http::request::RequestIdLayer;
use crate::http::websocket::WebSocketRegistration;
use crate::routing::RouteTable;

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub middleware: Arc<MiddlewareChain>,
    pub websocket: Option<Arc<WebSocketRegistration>>,
    pub context: HandlerContext,
    pub max_body_size: usize,
    pub request_timeout: Duration,
}

/// HTTP server for the site.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(RequestIdLayer::propagate())
            .layer(TraceLayer::new_for_http())
            .layer(RequestIdLayer::set())
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
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
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
