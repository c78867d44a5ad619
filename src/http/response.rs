//! Response building and finalization.
//!
//! # Responsibilities
//! - Accumulate status, status text and headers for a request
//! - Finalize exactly once with a raw, HTML or JSON body
//! - Render the finalized reply into an HTTP response
//!
//! # Design Decisions
//! - Explicit `Pending → Finalized` state instead of inferring from the body
//! - A second finalization is rejected with `ReplyError::AlreadyFinalized`
//!   and the first body is kept
//! - Status text travels as the HTTP/1 reason phrase

use axum::body::{Body, Bytes};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use hyper::ext::ReasonPhrase;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Errors raised while finalizing a reply.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("reply already finalized")]
    AlreadyFinalized,

    #[error("failed to serialize JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lifecycle of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    /// Nothing has produced a body yet.
    Pending,
    /// Status and body are fixed.
    Finalized,
}

/// Mutable response shared along the middleware chain and the route handler.
#[derive(Debug)]
pub struct Reply {
    status: StatusCode,
    status_text: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    state: ReplyState,
}

impl Reply {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            status_text: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            state: ReplyState::Pending,
        }
    }

    pub fn state(&self) -> ReplyState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == ReplyState::Finalized
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn status_text_value(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Set the status code. Ignored once finalized or if `code` is invalid.
    pub fn status(&mut self, code: u16) -> &mut Self {
        if self.is_finalized() {
            tracing::debug!(code, "Ignoring status change on finalized reply");
            return self;
        }
        match StatusCode::from_u16(code) {
            Ok(status) => self.status = status,
            Err(_) => tracing::warn!(code, "Ignoring invalid status code"),
        }
        self
    }

    /// Set the status text (reason phrase). Ignored once finalized.
    pub fn status_text(&mut self, text: impl Into<String>) -> &mut Self {
        if !self.is_finalized() {
            self.status_text = Some(text.into());
        }
        self
    }

    /// Set a response header. Ignored once finalized.
    pub fn header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        if !self.is_finalized() {
            self.headers.insert(name, value);
        }
        self
    }

    fn finalize(&mut self, body: Bytes, content_type: Option<HeaderValue>) -> Result<(), ReplyError> {
        if self.is_finalized() {
            tracing::warn!(status = %self.status, "Attempt to finalize a reply twice");
            return Err(ReplyError::AlreadyFinalized);
        }
        if let Some(ct) = content_type {
            self.headers.entry(header::CONTENT_TYPE).or_insert(ct);
        }
        self.body = body;
        self.state = ReplyState::Finalized;
        Ok(())
    }

    /// Finalize with a raw body.
    pub fn send(&mut self, body: impl Into<Bytes>) -> Result<(), ReplyError> {
        self.finalize(body.into(), None)
    }

    /// Finalize with a raw body and an explicit content type.
    pub fn send_typed(&mut self, body: impl Into<Bytes>, content_type: &'static str) -> Result<(), ReplyError> {
        self.finalize(body.into(), Some(HeaderValue::from_static(content_type)))
    }

    /// Finalize with an HTML document.
    pub fn html(&mut self, body: impl Into<String>) -> Result<(), ReplyError> {
        self.send_typed(body.into(), "text/html; charset=utf-8")
    }

    /// Finalize with a JSON body.
    pub fn json<T: Serialize + ?Sized>(&mut self, body: &T) -> Result<(), ReplyError> {
        if self.is_finalized() {
            return Err(ReplyError::AlreadyFinalized);
        }
        let bytes = serde_json::to_vec(body)?;
        self.finalize(bytes.into(), Some(HeaderValue::from_static("application/json")))
    }

    /// Finalize with the `{status, statusText}` envelope.
    pub fn envelope(&mut self, status: StatusCode, status_text: &str) -> Result<(), ReplyError> {
        self.status(status.as_u16()).status_text(status_text);
        self.json(&json!({ "status": status.as_u16(), "statusText": status_text }))
    }

    /// Render a finalized reply; `None` while still pending.
    pub fn finish(self) -> Option<Response> {
        if !self.is_finalized() {
            return None;
        }

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;

        if let Some(text) = self.status_text {
            match ReasonPhrase::try_from(text) {
                Ok(reason) => {
                    response.extensions_mut().insert(reason);
                }
                Err(_) => tracing::debug!("Dropping status text that is not a valid reason phrase"),
            }
        }
        Some(response)
    }
}

impl Default for Reply {
    fn default() -> Self {
        Self::new()
    }
}
