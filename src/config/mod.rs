//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! hotroute.toml (+ PORT env, + CLI flags)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → passed by value into startup, shared via Arc where needed
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only site files hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, load_config, override_port, ConfigError};
pub use schema::{
    FolderConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, PagesConfig,
    ServerConfig, StoreConfig, TimeoutConfig, WatchConfig, WebSocketConfig,
};
