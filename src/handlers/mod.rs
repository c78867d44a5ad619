//! Handler contract and registry.
//!
//! # Data Flow
//! ```text
//! api/article.get.toml  ──(handler = "article.list")──┐
//! middleware/auth.toml  ──(handler = "require_header")─┤
//!                                                      ▼
//!                                              HandlerRegistry
//!                                                      │ resolve by name
//!                                                      ▼
//!                                   RouteEntry / MiddlewareEntry
//! ```
//!
//! # Design Decisions
//! - Files never contain code: a manifest names a handler registered at startup
//! - One trait serves route handlers and middleware
//! - Handlers finalize a `Reply`; returning `Err` with a pending reply yields a 500

pub mod article;
pub mod pages;
pub mod static_files;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;

use crate::http::request::RequestView;
use crate::http::response::{Reply, ReplyError};
use crate::store::{DataStore, StoreError};

/// Errors a handler may return.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("data store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Reply(#[from] ReplyError),

    #[error("{0}")]
    Other(String),
}

/// Services injected into every handler invocation.
#[derive(Clone)]
pub struct HandlerContext {
    store: Arc<dyn DataStore>,
    options: Arc<Value>,
    request_id: Option<String>,
}

impl HandlerContext {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            options: Arc::new(Value::Null),
            request_id: None,
        }
    }

    /// Same services, with the options of a specific route or middleware.
    pub fn with_options(&self, options: Arc<Value>) -> Self {
        Self {
            store: Arc::clone(&self.store),
            options,
            request_id: self.request_id.clone(),
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn store(&self) -> &dyn DataStore {
        self.store.as_ref()
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    /// String option of the current route, if set.
    pub fn option_str(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(Value::as_str)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("options", &self.options)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Future returned by a handler.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), HandlerError>>;

/// A route handler or middleware.
pub trait Handler: Send + Sync {
    fn call<'a>(
        &'a self,
        req: &'a RequestView,
        reply: &'a mut Reply,
        ctx: &'a HandlerContext,
    ) -> HandlerFuture<'a>;
}

/// Adapter turning a synchronous closure into a [`Handler`].
pub struct FnHandler<F> {
    f: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&RequestView, &mut Reply, &HandlerContext) -> Result<(), HandlerError> + Send + Sync,
{
    fn call<'a>(
        &'a self,
        req: &'a RequestView,
        reply: &'a mut Reply,
        ctx: &'a HandlerContext,
    ) -> HandlerFuture<'a> {
        let result = (self.f)(req, reply, ctx);
        Box::pin(std::future::ready(result))
    }
}

/// Wrap a synchronous closure as a shared handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&RequestView, &mut Reply, &HandlerContext) -> Result<(), HandlerError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler { f })
}

/// Name → handler lookup used when resolving manifests.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the bundled handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        article::register(&mut registry);
        crate::http::middleware::register_builtins(&mut registry);
        registry
    }

    /// Register (or replace) a handler under `name`.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> &mut Self {
        let name = name.into();
        if self.handlers.insert(name.clone(), handler).is_some() {
            tracing::debug!(handler = %name, "Replaced registered handler");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}

/// JavaScript-style truthiness used by payload validation.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use axum::http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn fn_handler_finalizes_reply() {
        let handler = handler_fn(|req, reply, _ctx| {
            reply.send(format!("hello {}", req.path()))?;
            Ok(())
        });
        let ctx = HandlerContext::new(Arc::new(MemoryStore::new(["article"])));
        let req = RequestView::new(Method::GET, "/x");
        let mut reply = Reply::new();

        handler.call(&req, &mut reply, &ctx).await.unwrap();
        assert!(reply.is_finalized());
        assert_eq!(reply.body().as_ref(), b"hello /x");
    }

    #[test]
    fn registry_contains_builtins() {
        let registry = HandlerRegistry::with_builtins();
        for name in ["article.list", "article.create", "article.update", "article.delete"] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn context_options() {
        let ctx = HandlerContext::new(Arc::new(MemoryStore::new(["article"])))
            .with_options(Arc::new(json!({"table": "article"})))
            .with_request_id(Some("r-1".into()));
        assert_eq!(ctx.option_str("table"), Some("article"));
        assert_eq!(ctx.request_id(), Some("r-1"));
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(null))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(is_truthy(Some(&json!(5))));
        assert!(is_truthy(Some(&json!("widget"))));
        assert!(is_truthy(Some(&json!([]))));
    }
}
