//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems emit `tracing` events with structured fields
//!     → logging.rs (EnvFilter + pretty/JSON formatter)
//!     → stdout
//! tower_http::trace::TraceLayer adds one span per request, tagged with x-request-id
//! ```

pub mod logging;
