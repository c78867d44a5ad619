//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, tower layers)
//!     → dispatch.rs (upgrade, middleware, route resolution)
//!     → request.rs (RequestView, request ID)
//!     → handler
//!     → response.rs (Reply → Response)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestIdExt, RequestIdLayer, RequestView, X_REQUEST_ID};
pub use response::{Reply, ReplyError, ReplyState};
pub use server::{AppState, HttpServer};
pub use websocket::{LoggingSocketHandler, SocketConnection, SocketHandler, SocketMessage, WebSocketRegistration};
