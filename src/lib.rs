//! File-convention web server with hot route reload.
//!
//! Routes, pages, static assets and middleware are discovered from site
//! directories, served through a concurrently readable route table, and
//! kept in sync with the filesystem while the server runs.

pub mod config;
pub mod handlers;
pub mod http;
pub mod lifecycle;
pub mod loader;
pub mod observability;
pub mod routing;
pub mod store;

pub use config::ServerConfig;
pub use handlers::{handler_fn, Handler, HandlerContext, HandlerError, HandlerRegistry};
pub use http::HttpServer;
pub use lifecycle::{bootstrap, bootstrap_with, App, Extensions, Shutdown};
pub use routing::RouteTable;
