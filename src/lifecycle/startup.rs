//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order: store → registry → loader → server
//! - Start the route watcher
//! - Run the server until shutdown, then persist the store
//!
//! # Design Decisions
//! - Fail fast: store and WebSocket setup errors are fatal
//! - Per-file route errors are not (the loader logs and skips them)
//! - A watcher that cannot start downgrades to serving without hot reload

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::handlers::pages::PageSettings;
use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::http::middleware::MiddlewareChain;
use crate::http::websocket::WebSocketRegistration;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::Shutdown;
use crate::loader::{spawn_reconciler, FileWatcher, LoadSummary, RouteLoader};
use crate::routing::RouteTable;
use crate::store::{MemoryStore, StoreError};

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("data store: {0}")]
    Store(#[from] StoreError),

    #[error("invalid websocket path pattern: {0}")]
    WebSocketPattern(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extension points supplied by an embedding program.
#[derive(Default)]
pub struct Extensions {
    /// Registry used instead of `HandlerRegistry::with_builtins()`.
    pub registry: Option<HandlerRegistry>,
    /// Replaces the WebSocket registration derived from config.
    pub websocket: Option<WebSocketRegistration>,
}

/// A fully wired server, ready to run.
pub struct App {
    pub config: ServerConfig,
    pub server: HttpServer,
    pub loader: Arc<RouteLoader>,
    pub routes: Arc<RouteTable>,
    pub store: Arc<MemoryStore>,
    pub summary: LoadSummary,
}

/// Build the app from config with the bundled handlers.
pub fn bootstrap(config: ServerConfig) -> Result<App, StartupError> {
    bootstrap_with(config, Extensions::default())
}

/// Build the app from config plus embedder-supplied extensions.
pub fn bootstrap_with(config: ServerConfig, extensions: Extensions) -> Result<App, StartupError> {
    let store = Arc::new(match &config.store.snapshot_path {
        Some(path) => MemoryStore::load_from_file(path, config.store.tables.iter().cloned())?,
        None => MemoryStore::new(config.store.tables.iter().cloned()),
    });
    info!(tables = ?store.table_names(), "Data store ready");

    let registry = Arc::new(extensions.registry.unwrap_or_else(HandlerRegistry::with_builtins));
    info!(handlers = registry.len(), "Handler registry ready");

    let routes = Arc::new(RouteTable::new());
    let middleware = Arc::new(MiddlewareChain::new());
    let pages = PageSettings::new(&config.pages.template, config.pages.raw_accept.clone());
    let loader = Arc::new(RouteLoader::new(
        &config.folders,
        pages,
        registry,
        Arc::clone(&routes),
        Arc::clone(&middleware),
    ));
    let summary = loader.load_initial();

    let websocket = match extensions.websocket {
        Some(registration) => Some(registration),
        None if config.websocket.enabled => {
            let patterns = config
                .websocket
                .paths
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()?;
            Some(WebSocketRegistration::logging(patterns))
        }
        None => None,
    };
    if let Some(ws) = &websocket {
        info!(registration = ?ws, "WebSocket upgrades enabled");
    }

    let state = AppState {
        routes: Arc::clone(&routes),
        middleware,
        websocket: websocket.map(Arc::new),
        context: HandlerContext::new(store.clone()),
        max_body_size: config.limits.max_body_size,
        request_timeout: Duration::from_secs(config.timeouts.request_secs),
    };
    let server = HttpServer::new(config.clone(), state);

    Ok(App {
        config,
        server,
        loader,
        routes,
        store,
        summary,
    })
}

impl App {
    /// Serve on `listener` until `shutdown` fires, then save the store.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), StartupError> {
        // Held until the server stops; dropping it ends notifications.
        let _watcher = if self.config.watch.enabled {
            match FileWatcher::start(&self.loader.existing_roots()) {
                Ok((watcher, events)) => {
                    spawn_reconciler(Arc::clone(&self.loader), events, shutdown.subscribe());
                    Some(watcher)
                }
                Err(e) => {
                    warn!(error = %e, "Hot reload disabled");
                    None
                }
            }
        } else {
            info!("Hot reload disabled by configuration");
            None
        };

        self.server.run(listener, shutdown.subscribe()).await?;

        if let Err(e) = self.store.save_to_file() {
            warn!(error = %e, "Failed to save store snapshot");
        }
        Ok(())
    }
}
