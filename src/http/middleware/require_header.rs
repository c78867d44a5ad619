//! Header-based access middleware.
//!
//! `require_header` options:
//! - `header`: header name to check (default `authorization`)
//! - `value`: expected value; when absent only presence is required
//!
//! `set_header` options: `name`, `value`. Adds a response header and lets the
//! request continue.

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;
use tracing::warn;

use crate::handlers::{Handler, HandlerContext, HandlerError, HandlerFuture};
use crate::http::request::RequestView;
use crate::http::response::Reply;

/// Rejects requests missing a header (401) or carrying the wrong value (403).
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireHeader;

impl Handler for RequireHeader {
    fn call<'a>(
        &'a self,
        req: &'a RequestView,
        reply: &'a mut Reply,
        ctx: &'a HandlerContext,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let name = ctx.option_str("header").unwrap_or("authorization");

            let actual = match req.header(name) {
                Some(v) => v,
                None => {
                    warn!(path = %req.path(), header = %name, "Missing required header");
                    reply.envelope(StatusCode::UNAUTHORIZED, "Unauthorized")?;
                    return Ok(());
                }
            };

            if let Some(expected) = ctx.option_str("value") {
                if actual != expected {
                    warn!(path = %req.path(), header = %name, "Header value rejected");
                    reply.envelope(StatusCode::FORBIDDEN, "Forbidden")?;
                }
            }
            Ok::<(), HandlerError>(())
        })
    }
}

/// Adds a header to the eventual response.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetHeader;

impl Handler for SetHeader {
    fn call<'a>(
        &'a self,
        _req: &'a RequestView,
        reply: &'a mut Reply,
        ctx: &'a HandlerContext,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let (Some(name), Some(value)) = (ctx.option_str("name"), ctx.option_str("value")) else {
                warn!("set_header middleware needs `name` and `value` options");
                return Ok(());
            };
            match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    reply.header(name, value);
                }
                _ => warn!(header = %name, "Invalid header in set_header options"),
            }
            Ok::<(), HandlerError>(())
        })
    }
}
