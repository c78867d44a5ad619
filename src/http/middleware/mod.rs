//! Middleware chain.
//!
//! # Responsibilities
//! - Hold middleware entries in registration (discovery) order
//! - Select entries whose path regex matches the literal request path
//! - Provide the bundled middleware handlers
//!
//! # Design Decisions
//! - Loaded once at boot; file changes do not reload middleware
//! - Regex search, so a plain string pattern behaves like a substring match
//! - A middleware that finalizes the reply short-circuits the rest of the request

pub mod require_header;

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use regex::Regex;
use serde_json::Value;

use crate::handlers::{Handler, HandlerRegistry};
use crate::routing::RouteOrigin;

/// Register the bundled middleware handlers.
pub fn register_builtins(registry: &mut HandlerRegistry) {
    registry
        .register("require_header", Arc::new(require_header::RequireHeader))
        .register("set_header", Arc::new(require_header::SetHeader));
}

/// A middleware bound to a path pattern.
pub struct MiddlewareEntry {
    pub path_pattern: Regex,
    pub handler: Arc<dyn Handler>,
    pub origin: RouteOrigin,
    pub options: Arc<Value>,
}

impl MiddlewareEntry {
    pub fn new(path_pattern: Regex, handler: Arc<dyn Handler>) -> Self {
        Self {
            path_pattern,
            handler,
            origin: RouteOrigin::programmatic(),
            options: Arc::new(Value::Null),
        }
    }

    pub fn with_origin(mut self, origin: RouteOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn applies_to(&self, path: &str) -> bool {
        self.path_pattern.is_match(path)
    }
}

impl fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareEntry")
            .field("path_pattern", &self.path_pattern.as_str())
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Ordered middleware list shared by all requests.
pub struct MiddlewareChain {
    entries: ArcSwap<Vec<Arc<MiddlewareEntry>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append an entry at the end of the chain.
    pub fn push(&self, entry: MiddlewareEntry) {
        let entry = Arc::new(entry);
        self.entries.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&entry));
            next
        });
    }

    /// Entries applying to `path`, in registration order.
    pub fn matching(&self, path: &str) -> Vec<Arc<MiddlewareEntry>> {
        self.entries
            .load()
            .iter()
            .filter(|entry| entry.applies_to(path))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.load().iter()).finish()
    }
}
