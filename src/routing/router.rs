//! Route table: lookup and live mutation.
//!
//! # Responsibilities
//! - Store `(pattern, method)` → handler entries in registration order
//! - Resolve a request path: exact literal lookup first, then parameterized scan
//! - Upsert, remove by originating file, and replace-by-origin for hot reload
//!
//! # Design Decisions
//! - Readers load an immutable snapshot through `ArcSwap` (no locks on the hot path)
//! - Writers are serialized by a mutex and publish a whole new snapshot, so a
//!   reader observes either the old or the new table, never a torn one
//! - Exact lookup goes through a pattern index; only parameterized patterns are scanned
//! - Among overlapping parameterized patterns the first registered wins
//! - Upserting an existing key keeps its registration slot

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use axum::http::Method;
use serde_json::Value;

use crate::handlers::Handler;
use crate::routing::matcher::{is_parameterized, match_path, PathParams};

/// HTTP method filter of a route: a single verb or the `ALL` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodFilter {
    All,
    Only(Method),
}

impl MethodFilter {
    /// Returns true if a request with `method` is accepted.
    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            MethodFilter::All => true,
            MethodFilter::Only(m) => m == method,
        }
    }
}

impl FromStr for MethodFilter {
    type Err = axum::http::method::InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if upper == "ALL" {
            return Ok(MethodFilter::All);
        }
        Method::from_bytes(upper.as_bytes()).map(MethodFilter::Only)
    }
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        MethodFilter::Only(method)
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::All => f.write_str("ALL"),
            MethodFilter::Only(m) => f.write_str(m.as_str()),
        }
    }
}

/// Structural route key. Two keys are equal iff pattern and method are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub pattern: String,
    pub method: MethodFilter,
}

impl RouteKey {
    pub fn new(pattern: impl Into<String>, method: impl Into<MethodFilter>) -> Self {
        Self {
            pattern: pattern.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern)
    }
}

/// Where a route came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteOrigin {
    pub is_file_backed: bool,
    pub source_path: Option<PathBuf>,
}

impl RouteOrigin {
    /// Origin of a route registered in code.
    pub fn programmatic() -> Self {
        Self::default()
    }

    /// Origin of a route derived from a watched file.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            is_file_backed: true,
            source_path: Some(path.into()),
        }
    }

    fn is(&self, path: &Path) -> bool {
        self.source_path.as_deref() == Some(path)
    }

    fn is_under(&self, dir: &Path) -> bool {
        self.source_path
            .as_deref()
            .map(|p| p.starts_with(dir))
            .unwrap_or(false)
    }
}

/// A handler bound to a route key.
pub struct RouteEntry {
    pub handler: Arc<dyn Handler>,
    pub origin: RouteOrigin,
    /// Per-route options handed to the handler through its context.
    pub options: Arc<Value>,
}

impl RouteEntry {
    pub fn new(handler: Arc<dyn Handler>, origin: RouteOrigin) -> Self {
        Self {
            handler,
            origin,
            options: Arc::new(Value::Null),
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Arc::new(options);
        self
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("origin", &self.origin)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Result of resolving a request against the table.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub key: RouteKey,
    pub entry: Arc<RouteEntry>,
    pub params: PathParams,
}

/// Immutable view of the table published to readers.
#[derive(Default)]
struct Snapshot {
    entries: Vec<(RouteKey, Arc<RouteEntry>)>,
    /// pattern → positions in `entries`.
    by_pattern: HashMap<String, Vec<usize>>,
}

impl Snapshot {
    fn from_entries(entries: Vec<(RouteKey, Arc<RouteEntry>)>) -> Self {
        let mut by_pattern: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, (key, _)) in entries.iter().enumerate() {
            by_pattern.entry(key.pattern.clone()).or_default().push(i);
        }
        Self { entries, by_pattern }
    }

    fn exact(&self, path: &str, method: &MethodFilter) -> Option<&(RouteKey, Arc<RouteEntry>)> {
        self.by_pattern
            .get(path)?
            .iter()
            .map(|&i| &self.entries[i])
            .find(|(key, _)| &key.method == method)
    }
}

/// Concurrent route table.
pub struct RouteTable {
    current: ArcSwap<Snapshot>,
    writer: Mutex<()>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(Snapshot::default()),
            writer: Mutex::new(()),
        }
    }

    /// Apply `f` to a copy of the entries and publish the result.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<(RouteKey, Arc<RouteEntry>)>) -> R) -> R {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.current.load().entries.clone();
        let result = f(&mut entries);
        self.current.store(Arc::new(Snapshot::from_entries(entries)));
        result
    }

    /// Insert or replace the entry for `key`.
    pub fn insert(&self, key: RouteKey, entry: RouteEntry) {
        let entry = Arc::new(entry);
        self.mutate(|entries| upsert(entries, key, entry));
    }

    /// Remove every entry originating from `path`. Returns the removed keys.
    pub fn remove_by_origin(&self, path: &Path) -> Vec<RouteKey> {
        self.mutate(|entries| drain_where(entries, |e| e.origin.is(path)))
    }

    /// Remove every entry originating from a file under `dir`.
    pub fn remove_by_origin_prefix(&self, dir: &Path) -> Vec<RouteKey> {
        self.mutate(|entries| drain_where(entries, |e| e.origin.is_under(dir)))
    }

    /// Atomically drop the entries of `path` and insert `replacements`.
    pub fn replace_origin(&self, path: &Path, replacements: Vec<(RouteKey, RouteEntry)>) -> Vec<RouteKey> {
        self.mutate(|entries| {
            // Keep the slot of a key that survives the reload.
            let mut removed = Vec::new();
            entries.retain(|(key, entry)| {
                let stale = entry.origin.is(path)
                    && !replacements.iter().any(|(new_key, _)| new_key == key);
                if stale {
                    removed.push(key.clone());
                }
                !stale
            });
            for (key, entry) in replacements {
                upsert(entries, key, Arc::new(entry));
            }
            removed
        })
    }

    /// Literal lookup, falling back to an `ALL` entry for the same path.
    pub fn find_exact(&self, path: &str, method: &Method) -> Option<(RouteKey, Arc<RouteEntry>)> {
        let snapshot = self.current.load();
        snapshot
            .exact(path, &MethodFilter::Only(method.clone()))
            .or_else(|| snapshot.exact(path, &MethodFilter::All))
            .cloned()
    }

    /// Scan parameterized patterns in registration order.
    pub fn find_parameterized(&self, path: &str, method: &Method) -> Option<RouteMatch> {
        let snapshot = self.current.load();
        snapshot
            .entries
            .iter()
            .filter(|(key, _)| key.method.accepts(method) && is_parameterized(&key.pattern))
            .find_map(|(key, entry)| {
                match_path(&key.pattern, path).map(|params| RouteMatch {
                    key: key.clone(),
                    entry: Arc::clone(entry),
                    params,
                })
            })
    }

    /// Resolve a request: exact match first, then parameterized.
    pub fn resolve(&self, path: &str, method: &Method) -> Option<RouteMatch> {
        if let Some((key, entry)) = self.find_exact(path, method) {
            return Some(RouteMatch {
                key,
                entry,
                params: PathParams::new(),
            });
        }
        self.find_parameterized(path, method)
    }

    /// Look up the entry registered under exactly `key`.
    pub fn get(&self, key: &RouteKey) -> Option<Arc<RouteEntry>> {
        self.current
            .load()
            .exact(&key.pattern, &key.method)
            .map(|(_, entry)| Arc::clone(entry))
    }

    /// Returns true if any entry originates from `path`.
    pub fn contains_origin(&self, path: &Path) -> bool {
        self.current
            .load()
            .entries
            .iter()
            .any(|(_, entry)| entry.origin.is(path))
    }

    /// Keys in registration order.
    pub fn snapshot(&self) -> Vec<RouteKey> {
        self.current
            .load()
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.current.load().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable").field("keys", &self.snapshot()).finish()
    }
}

fn upsert(entries: &mut Vec<(RouteKey, Arc<RouteEntry>)>, key: RouteKey, entry: Arc<RouteEntry>) {
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some(slot) => slot.1 = entry,
        None => entries.push((key, entry)),
    }
}

fn drain_where(
    entries: &mut Vec<(RouteKey, Arc<RouteEntry>)>,
    pred: impl Fn(&RouteEntry) -> bool,
) -> Vec<RouteKey> {
    let mut removed = Vec::new();
    entries.retain(|(key, entry)| {
        if pred(entry) {
            removed.push(key.clone());
            false
        } else {
            true
        }
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{handler_fn, Handler};
    use crate::http::response::Reply;

    fn named(tag: &'static str) -> Arc<dyn Handler> {
        handler_fn(move |_req, reply: &mut Reply, _ctx| {
            reply.send(tag)?;
            Ok(())
        })
    }

    fn entry(tag: &'static str) -> RouteEntry {
        RouteEntry::new(named(tag), RouteOrigin::programmatic())
    }

    fn file_entry(tag: &'static str, path: &str) -> RouteEntry {
        RouteEntry::new(named(tag), RouteOrigin::file(path))
    }

    #[test]
    fn method_filter_parses_all_and_verbs() {
        assert_eq!("ALL".parse::<MethodFilter>().unwrap(), MethodFilter::All);
        assert_eq!("all".parse::<MethodFilter>().unwrap(), MethodFilter::All);
        assert_eq!(
            "put".parse::<MethodFilter>().unwrap(),
            MethodFilter::Only(Method::PUT)
        );
        assert_eq!(MethodFilter::All.to_string(), "ALL");
    }

    #[test]
    fn route_keys_compare_structurally() {
        let a = RouteKey::new(String::from("/article"), Method::GET);
        let b = RouteKey::new("/article", MethodFilter::Only(Method::GET));
        assert_eq!(a, b);
        assert_ne!(a, RouteKey::new("/article", MethodFilter::All));
    }

    #[test]
    fn insert_same_key_twice_replaces() {
        let table = RouteTable::new();
        table.insert(RouteKey::new("/article", Method::GET), entry("one"));
        let len_after_one = table.len();
        table.insert(RouteKey::new("/article", Method::GET), entry("two"));
        assert_eq!(table.len(), len_after_one);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn exact_lookup_falls_back_to_all() {
        let table = RouteTable::new();
        table.insert(RouteKey::new("/ping", MethodFilter::All), entry("any"));
        table.insert(RouteKey::new("/ping", Method::POST), entry("post"));

        let (key, _) = table.find_exact("/ping", &Method::POST).unwrap();
        assert_eq!(key.method, MethodFilter::Only(Method::POST));

        let (key, _) = table.find_exact("/ping", &Method::GET).unwrap();
        assert_eq!(key.method, MethodFilter::All);

        assert!(table.find_exact("/pong", &Method::GET).is_none());
    }

    #[test]
    fn literal_route_wins_over_parameterized() {
        let table = RouteTable::new();
        table.insert(RouteKey::new("/article/:id", Method::GET), entry("param"));
        table.insert(RouteKey::new("/article/latest", Method::GET), entry("literal"));

        let found = table.resolve("/article/latest", &Method::GET).unwrap();
        assert_eq!(found.key.pattern, "/article/latest");
        assert!(found.params.is_empty());

        let found = table.resolve("/article/9", &Method::GET).unwrap();
        assert_eq!(found.key.pattern, "/article/:id");
        assert_eq!(found.params.get("id"), Some("9"));
    }

    #[test]
    fn parameterized_scan_respects_method_and_order() {
        let table = RouteTable::new();
        table.insert(RouteKey::new("/a/:x", Method::PUT), entry("first"));
        table.insert(RouteKey::new("/a/:y", MethodFilter::All), entry("second"));

        let put = table.find_parameterized("/a/1", &Method::PUT).unwrap();
        assert_eq!(put.key.pattern, "/a/:x");

        let get = table.find_parameterized("/a/1", &Method::GET).unwrap();
        assert_eq!(get.key.pattern, "/a/:y");
        assert_eq!(get.params.get("y"), Some("1"));

        assert!(table.find_parameterized("/b/1", &Method::GET).is_none());
    }

    #[test]
    fn remove_by_origin_only_touches_that_file() {
        let table = RouteTable::new();
        table.insert(RouteKey::new("/a", Method::GET), file_entry("a", "/site/api/a.get.toml"));
        table.insert(RouteKey::new("/b", Method::GET), file_entry("b", "/site/api/b.get.toml"));

        let removed = table.remove_by_origin(Path::new("/site/api/a.get.toml"));
        assert_eq!(removed, vec![RouteKey::new("/a", Method::GET)]);
        assert_eq!(table.len(), 1);
        assert!(table.contains_origin(Path::new("/site/api/b.get.toml")));
        assert!(table.remove_by_origin(Path::new("/missing")).is_empty());
    }

    #[test]
    fn remove_by_origin_prefix_drops_directory() {
        let table = RouteTable::new();
        table.insert(RouteKey::new("/x/a", Method::GET), file_entry("a", "/site/api/x/a.get.toml"));
        table.insert(RouteKey::new("/y", Method::GET), file_entry("y", "/site/api/y.get.toml"));

        let removed = table.remove_by_origin_prefix(Path::new("/site/api/x"));
        assert_eq!(removed.len(), 1);
        assert_eq!(table.snapshot(), vec![RouteKey::new("/y", Method::GET)]);
    }

    #[test]
    fn replace_origin_swaps_pattern_atomically() {
        let table = RouteTable::new();
        let origin = Path::new("/site/api/item.get.toml");
        table.insert(RouteKey::new("/item", Method::GET), file_entry("old", "/site/api/item.get.toml"));
        table.insert(RouteKey::new("/other", Method::GET), entry("other"));

        let removed = table.replace_origin(
            origin,
            vec![(RouteKey::new("/item", Method::GET), file_entry("new", "/site/api/item.get.toml"))],
        );
        assert!(removed.is_empty());
        assert_eq!(table.len(), 2);
        // Slot preserved
        assert_eq!(table.snapshot()[0], RouteKey::new("/item", Method::GET));
    }

    #[test]
    fn concurrent_readers_never_see_missing_route_during_replace() {
        let table = Arc::new(RouteTable::new());
        let origin = PathBuf::from("/site/api/hot.get.toml");
        table.insert(RouteKey::new("/hot", Method::GET), RouteEntry::new(named("v0"), RouteOrigin::file(&origin)));

        let reader = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    assert!(table.resolve("/hot", &Method::GET).is_some());
                }
            })
        };

        for _ in 0..500 {
            table.replace_origin(
                &origin,
                vec![(
                    RouteKey::new("/hot", Method::GET),
                    RouteEntry::new(named("v1"), RouteOrigin::file(&origin)),
                )],
            );
        }

        reader.join().unwrap();
        assert_eq!(table.len(), 1);
    }
}
