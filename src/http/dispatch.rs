//! Per-request dispatch.
//!
//! # Data Flow
//! ```text
//! Request
//!     → WebSocket registration matches? → upgrade (101) or 400
//!     → (bounded by the request timeout, else 408)
//!     → buffer body (over the limit → 413), build RequestView
//!     → middleware chain (first finalized reply wins)
//!     → RouteTable::resolve → parse JSON → handler
//!     → pending reply → 404
//! ```
//!
//! # Design Decisions
//! - The route table is read once per request; a reload mid-request never
//!   affects the entry already resolved
//! - Handler errors never leak: a pending reply becomes a 500 envelope
//! - Body limit and timeout live here so their replies use the envelope too

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRequestParts, Request, State};
use axum::extract::ws::WebSocketUpgrade;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::http::request::RequestView;
use crate::http::response::Reply;
use crate::http::server::AppState;
use crate::routing::RouteMatch;

/// Entry point installed as the router fallback.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();
    let path = parts.uri.path().to_owned();

    if let Some(ws) = state.websocket.as_ref().filter(|ws| ws.matches(&path)) {
        return match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
            Ok(upgrade) => {
                debug!(path = %path, "Upgrading to WebSocket");
                ws.accept(upgrade)
            }
            Err(rejection) => {
                warn!(path = %path, error = %rejection, "WebSocket upgrade rejected");
                finalize_or(Reply::new(), StatusCode::BAD_REQUEST, "WebSocket upgrade failed")
            }
        };
    }

    match tokio::time::timeout(state.request_timeout, handle(&state, &parts, body, &path)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(
                path = %path,
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Request timed out"
            );
            finalize_or(Reply::new(), StatusCode::REQUEST_TIMEOUT, "Request timeout")
        }
    }
}

async fn handle(state: &AppState, parts: &Parts, body: Body, path: &str) -> Response {
    let bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path, error = %e, "Failed to buffer request body");
            return finalize_or(Reply::new(), StatusCode::PAYLOAD_TOO_LARGE, "Payload too large");
        }
    };

    let mut view = RequestView::from_parts(parts, bytes);
    let base = state
        .context
        .clone()
        .with_request_id(view.request_id().map(str::to_owned));
    let mut reply = Reply::new();

    for middleware in state.middleware.matching(path) {
        let ctx = base.with_options(Arc::clone(&middleware.options));
        if let Err(e) = middleware.handler.call(&view, &mut reply, &ctx).await {
            error!(
                request_id = ?ctx.request_id(),
                path = %path,
                middleware = %middleware.path_pattern,
                error = %e,
                "Middleware failed"
            );
            return finalize_or(reply, StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
        if reply.is_finalized() {
            debug!(path = %path, middleware = %middleware.path_pattern, "Middleware answered request");
            return finalize_or(reply, StatusCode::NOT_FOUND, "Not found");
        }
    }

    if let Some(RouteMatch { key, entry, params }) = state.routes.resolve(path, view.method()) {
        view.set_params(params);
        if let Err(e) = view.parse_json() {
            debug!(route = %key, error = %e, "Rejecting malformed JSON body");
            return finalize_or(reply, StatusCode::BAD_REQUEST, "Bad request");
        }

        let ctx = base.with_options(Arc::clone(&entry.options));
        if let Err(e) = entry.handler.call(&view, &mut reply, &ctx).await {
            error!(
                request_id = ?ctx.request_id(),
                route = %key,
                error = %e,
                "Handler failed"
            );
            return finalize_or(reply, StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    }

    finalize_or(reply, StatusCode::NOT_FOUND, "Not found")
}

/// Render `reply`, finalizing it with an envelope first if still pending.
fn finalize_or(mut reply: Reply, status: StatusCode, status_text: &str) -> Response {
    if !reply.is_finalized() {
        if let Err(e) = reply.envelope(status, status_text) {
            error!(error = %e, "Failed to build envelope");
        }
    }
    reply
        .finish()
        .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
