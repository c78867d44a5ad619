//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) and echo it back to the client
//! - Build the `RequestView` handed to middleware and route handlers
//! - Carry path parameter bindings and the parsed JSON payload
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body is buffered once; JSON is parsed only when a route matched
//! - An absent body parses as an empty JSON object

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::header::HeaderName;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method, Request};
use serde_json::{Map, Value};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

use crate::routing::PathParams;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// Layers that assign and propagate `x-request-id`.
pub struct RequestIdLayer;

impl RequestIdLayer {
    /// Assigns an ID to requests that arrive without one.
    pub fn set() -> SetRequestIdLayer<MakeRequestUuidV4> {
        SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4)
    }

    /// Copies the request's ID onto the response.
    pub fn propagate() -> PropagateRequestIdLayer {
        PropagateRequestIdLayer::new(X_REQUEST_ID)
    }
}

/// Access to the request ID on anything carrying headers.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> Option<&str> {
        self.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

impl RequestIdExt for Parts {
    fn request_id(&self) -> Option<&str> {
        self.headers.request_id()
    }
}

/// Buffered view of an incoming request.
#[derive(Debug, Clone)]
pub struct RequestView {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Bytes,
    params: PathParams,
    json: Value,
}

impl RequestView {
    /// Create a bodiless request view.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: PathParams::new(),
            json: Value::Object(Map::new()),
        }
    }

    /// Build from request head and a buffered body.
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query,
            headers: parts.headers.clone(),
            body,
            params: PathParams::new(),
            json: Value::Object(Map::new()),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_params(mut self, params: PathParams) -> Self {
        self.params = params;
        self
    }

    pub fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Parse the buffered body as JSON. An empty body yields `{}`.
    pub fn parse_json(&mut self) -> Result<(), serde_json::Error> {
        self.json = if self.has_body() {
            serde_json::from_slice(&self.body)?
        } else {
            Value::Object(Map::new())
        };
        Ok(())
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers.request_id()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Parsed JSON payload.
    pub fn json(&self) -> &Value {
        &self.json
    }

    /// A top-level field of the JSON payload, if present.
    pub fn json_field(&self, name: &str) -> Option<&Value> {
        self.json.get(name)
    }
}
