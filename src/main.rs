//! hotroute
//!
//! Convention-based web server: drop a manifest, page or asset into the site
//! tree and it is served; edit or delete it and the route follows.
//!
//! # Architecture Overview
//!
//! ```text
//!                   ┌──────────────────────────────────────────────────────┐
//!                   │                       hotroute                        │
//!                   │                                                       │
//!  site/ files ─────┼─▶ notify ─▶ loader::watcher ─▶ RouteLoader::reconcile │
//!                   │                                      │                │
//!                   │                                      ▼                │
//!  Client Request ──┼─▶ axum + tower layers ─▶ dispatch ─▶ RouteTable       │
//!                   │     (trace, request id,      │       (ArcSwap)        │
//!                   │      timeout, body limit)    │                        │
//!                   │                              ▼                        │
//!  Client Response ◀┼───────────────────── Handler ─▶ DataStore             │
//!                   └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use hotroute::config::{apply_env, load_config, override_port, ServerConfig};
use hotroute::lifecycle::{bootstrap, wait_for_signal, Shutdown};
use hotroute::observability::logging;

const DEFAULT_CONFIG: &str = "hotroute.toml";

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "hotroute", version, about = "File-convention web server with hot route reload")]
struct Cli {
    /// Path to the TOML config file. `hotroute.toml` is used when present.
    #[arg(short, long, env = "HOTROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Listener port, overriding the config file and PORT.
    #[arg(short, long)]
    port: Option<u16>,

    /// Serve without watching the site for changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.is_file()));
    let mut config = match &config_path {
        Some(path) => load_config(path)?,
        None => {
            let mut config = ServerConfig::default();
            apply_env(&mut config)?;
            config
        }
    };
    if let Some(port) = cli.port {
        override_port(&mut config, port);
    }
    if cli.no_watch {
        config.watch.enabled = false;
    }

    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        "hotroute starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        max_body_size = config.limits.max_body_size,
        watch = config.watch.enabled,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let app = bootstrap(config)?;

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    app.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
