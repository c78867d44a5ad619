//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Roots scanned for routes, pages, static files and middleware.
    pub folders: FolderConfig,

    /// Page rendering settings.
    pub pages: PagesConfig,

    /// WebSocket upgrade paths.
    pub websocket: WebSocketConfig,

    /// Bundled data store settings.
    pub store: StoreConfig,

    /// Hot reload settings.
    pub watch: WatchConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Directory roots.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FolderConfig {
    /// API manifests (`name.METHOD.toml`).
    pub api: PathBuf,

    /// Page fragments.
    pub pages: PathBuf,

    /// Static assets served verbatim.
    pub public: PathBuf,

    /// Middleware manifests, loaded once at boot.
    pub middleware: PathBuf,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            api: PathBuf::from("site/api"),
            pages: PathBuf::from("site/pages"),
            public: PathBuf::from("site/public"),
            middleware: PathBuf::from("site/middleware"),
        }
    }
}

impl FolderConfig {
    /// Resolve every relative root against `base`.
    pub fn relative_to(&self, base: &std::path::Path) -> Self {
        let join = |p: &PathBuf| if p.is_absolute() { p.clone() } else { base.join(p) };
        Self {
            api: join(&self.api),
            pages: join(&self.pages),
            public: join(&self.public),
            middleware: join(&self.middleware),
        }
    }
}

/// Page rendering configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PagesConfig {
    /// HTML template wrapping every page fragment.
    pub template: PathBuf,

    /// `Accept` value asking for the bare fragment.
    pub raw_accept: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("site/template.html"),
            raw_accept: "raw/html".to_string(),
        }
    }
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Register the logging socket handler.
    pub enabled: bool,

    /// Regexes selecting upgradable paths.
    pub paths: Vec<String>,
}

/// Data store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Tables created at startup.
    pub tables: Vec<String>,

    /// JSON snapshot loaded at startup and written on shutdown.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            tables: vec!["article".to_string()],
            snapshot_path: None,
        }
    }
}

/// Hot reload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Watch the roots and reconcile the route table on change.
    pub enabled: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
