//! Filesystem-driven route loading.
//!
//! # Responsibilities
//! - Walk the configured roots at startup and populate the route table and
//!   middleware chain
//! - Apply watcher events incrementally (`reconcile`)
//! - Isolate failures per file
//!
//! # Data Flow
//! ```text
//! startup:   walk(root) ─▶ build entries ─▶ RouteTable::replace_origin
//! runtime:   WatchEvent ─▶ reconcile ─┬─ Created/Modified ─▶ replace_origin
//!                                     └─ Removed ─▶ remove_by_origin ─▶ rescan root
//! ```
//!
//! # Design Decisions
//! - One file is the unit of reload; entries are rebuilt fully before the
//!   table is touched, so a broken edit leaves the previous entry serving
//! - Middleware is read once at boot
//! - Roots are canonicalized so watcher paths and origins compare equal

pub mod discovery;
pub mod manifest;
pub mod watcher;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::Method;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::FolderConfig;
use crate::handlers::pages::{Page, PageSettings};
use crate::handlers::static_files::StaticFile;
use crate::handlers::HandlerRegistry;
use crate::http::middleware::{MiddlewareChain, MiddlewareEntry};
use crate::routing::{RouteEntry, RouteKey, RouteOrigin, RouteTable};

pub use discovery::RootKind;
use discovery::{api_route, is_ignored, page_pattern, static_pattern, walk};
use manifest::{MiddlewareManifest, RouteManifest};
pub use watcher::{spawn_reconciler, FileWatcher, WatchError, WatchEvent, WatchKind};

/// Why a single file could not become a route or middleware.
#[derive(Debug, Error)]
pub enum RouteLoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}: no handler registered as '{handler}'", path.display())]
    UnknownHandler { path: PathBuf, handler: String },

    #[error("{}: invalid method '{method}'", path.display())]
    InvalidMethod { path: PathBuf, method: String },

    #[error("{}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("{}: invalid middleware path pattern: {source}", path.display())]
    InvalidPattern {
        path: PathBuf,
        #[source]
        source: regex::Error,
    },
}

/// Counts reported by [`RouteLoader::load_initial`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub routes: usize,
    pub middleware: usize,
    pub failed: usize,
}

/// Builds routes from the site roots and keeps them in sync.
pub struct RouteLoader {
    roots: Vec<(RootKind, PathBuf)>,
    registry: Arc<HandlerRegistry>,
    routes: Arc<RouteTable>,
    middleware: Arc<MiddlewareChain>,
    pages: PageSettings,
}

impl RouteLoader {
    pub fn new(
        folders: &FolderConfig,
        pages: PageSettings,
        registry: Arc<HandlerRegistry>,
        routes: Arc<RouteTable>,
        middleware: Arc<MiddlewareChain>,
    ) -> Self {
        let roots = vec![
            (RootKind::Middleware, normalize(&folders.middleware)),
            (RootKind::Api, normalize(&folders.api)),
            (RootKind::Pages, normalize(&folders.pages)),
            (RootKind::Public, normalize(&folders.public)),
        ];
        Self {
            roots,
            registry,
            routes,
            middleware,
            pages,
        }
    }

    /// Normalized path of a root.
    pub fn root(&self, kind: RootKind) -> &Path {
        self.roots
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.as_path())
            .unwrap_or_else(|| Path::new(""))
    }

    /// Roots that exist on disk, for the watcher.
    pub fn existing_roots(&self) -> Vec<PathBuf> {
        self.roots
            .iter()
            .filter(|(_, p)| p.is_dir())
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    /// Walk every root in order: middleware, api, pages, public.
    pub fn load_initial(&self) -> LoadSummary {
        let mut summary = LoadSummary::default();

        for (kind, root) in &self.roots {
            let files = walk(root);
            if files.is_empty() {
                debug!(root = %root.display(), kind = %kind, "Root is empty or missing");
            }
            for file in files {
                let result = match kind {
                    RootKind::Middleware => self.load_middleware(&file).map(|()| {
                        summary.middleware += 1;
                    }),
                    _ => self.load_file(*kind, root, &file).map(|keys| {
                        summary.routes += keys.len();
                    }),
                };
                if let Err(e) = result {
                    summary.failed += 1;
                    warn!(error = %e, "Skipping file");
                }
            }
        }

        info!(
            routes = summary.routes,
            middleware = summary.middleware,
            failed = summary.failed,
            "Initial route load complete"
        );
        summary
    }

    /// Apply one watcher event to the route table.
    pub fn reconcile(&self, event: &WatchEvent) {
        if is_ignored(&event.path) {
            return;
        }
        let Some((kind, root)) = self.root_of(&event.path) else {
            debug!(path = %event.path.display(), "Event outside watched roots");
            return;
        };
        if kind == RootKind::Middleware {
            info!(path = %event.path.display(), "Middleware changes apply on restart");
            return;
        }

        match event.kind {
            WatchKind::Created | WatchKind::Modified if event.path.is_dir() => {
                let added = self.register_missing(kind, root, &event.path);
                info!(dir = %event.path.display(), added, "Scanned new directory");
            }
            WatchKind::Created | WatchKind::Modified if event.path.is_file() => {
                match self.load_file(kind, root, &event.path) {
                    Ok(keys) => info!(
                        path = %event.path.display(),
                        routes = ?keys.iter().map(ToString::to_string).collect::<Vec<_>>(),
                        "Route reloaded"
                    ),
                    Err(e) => warn!(error = %e, "Reload failed, keeping previous route"),
                }
            }
            // Vanished before we got to it.
            WatchKind::Created | WatchKind::Modified | WatchKind::Removed => {
                self.remove(kind, root, &event.path)
            }
        }
    }

    fn remove(&self, kind: RootKind, root: &Path, path: &Path) {
        let mut removed = self.routes.remove_by_origin(path);
        if removed.is_empty() {
            removed = self.routes.remove_by_origin_prefix(path);
        }
        if !removed.is_empty() {
            info!(
                path = %path.display(),
                routes = ?removed.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "Routes removed"
            );
        }

        // A rename arrives as a removal; pick up the file under its new name.
        let added = self.register_missing(kind, root, root);
        if added > 0 {
            info!(root = %root.display(), added, "Registered files found after removal");
        }
    }

    /// Load every file under `dir` that has no route yet.
    fn register_missing(&self, kind: RootKind, root: &Path, dir: &Path) -> usize {
        let mut added = 0;
        for file in walk(dir) {
            if self.routes.contains_origin(&file) {
                continue;
            }
            match self.load_file(kind, root, &file) {
                Ok(keys) => added += keys.len(),
                Err(e) => warn!(error = %e, "Skipping file"),
            }
        }
        added
    }

    /// Build the routes of `file` and swap them in atomically.
    pub fn load_file(&self, kind: RootKind, root: &Path, file: &Path) -> Result<Vec<RouteKey>, RouteLoadError> {
        let (key, entry) = self.build_entry(kind, root, file)?;
        debug!(route = %key, source = %file.display(), "Registering route");

        let stale = self.routes.replace_origin(file, vec![(key.clone(), entry)]);
        if !stale.is_empty() {
            debug!(source = %file.display(), removed = stale.len(), "Dropped stale routes");
        }
        Ok(vec![key])
    }

    fn build_entry(&self, kind: RootKind, root: &Path, file: &Path) -> Result<(RouteKey, RouteEntry), RouteLoadError> {
        let origin = RouteOrigin::file(file);
        match kind {
            RootKind::Api => {
                let (pattern, method) = api_route(root, file)?;
                let manifest = RouteManifest::parse(&read(file)?).map_err(|source| RouteLoadError::Manifest {
                    path: file.to_path_buf(),
                    source,
                })?;
                let handler = self.resolve_handler(file, &manifest.handler)?;
                Ok((
                    RouteKey::new(pattern, method),
                    RouteEntry::new(handler, origin).with_options(manifest.options()),
                ))
            }
            RootKind::Pages => {
                let pattern = page_pattern(root, file)?;
                let page = Page::load(file, self.pages.clone()).map_err(|source| RouteLoadError::Io {
                    path: file.to_path_buf(),
                    source,
                })?;
                Ok((RouteKey::new(pattern, Method::GET), RouteEntry::new(Arc::new(page), origin)))
            }
            RootKind::Public => {
                let pattern = static_pattern(root, file)?;
                Ok((
                    RouteKey::new(pattern, Method::GET),
                    RouteEntry::new(Arc::new(StaticFile::new(file)), origin),
                ))
            }
            RootKind::Middleware => Err(RouteLoadError::InvalidPath {
                path: file.to_path_buf(),
                reason: "middleware files do not define routes".into(),
            }),
        }
    }

    fn load_middleware(&self, file: &Path) -> Result<(), RouteLoadError> {
        let manifest = MiddlewareManifest::parse(&read(file)?).map_err(|source| RouteLoadError::Manifest {
            path: file.to_path_buf(),
            source,
        })?;
        let pattern = Regex::new(&manifest.path).map_err(|source| RouteLoadError::InvalidPattern {
            path: file.to_path_buf(),
            source,
        })?;
        let handler = self.resolve_handler(file, &manifest.handler)?;

        debug!(pattern = %pattern, handler = %manifest.handler, "Registering middleware");
        self.middleware.push(
            MiddlewareEntry::new(pattern, handler)
                .with_origin(RouteOrigin::file(file))
                .with_options(manifest.options()),
        );
        Ok(())
    }

    fn resolve_handler(&self, file: &Path, name: &str) -> Result<Arc<dyn crate::handlers::Handler>, RouteLoadError> {
        self.registry.get(name).ok_or_else(|| RouteLoadError::UnknownHandler {
            path: file.to_path_buf(),
            handler: name.to_owned(),
        })
    }

    /// The most specific root containing `path`.
    fn root_of(&self, path: &Path) -> Option<(RootKind, &Path)> {
        self.roots
            .iter()
            .filter(|(_, root)| path.starts_with(root))
            .max_by_key(|(_, root)| root.components().count())
            .map(|(kind, root)| (*kind, root.as_path()))
    }
}

fn read(file: &Path) -> Result<String, RouteLoadError> {
    fs::read_to_string(file).map_err(|source| RouteLoadError::Io {
        path: file.to_path_buf(),
        source,
    })
}

/// Canonical form of a root, or its absolute form when it does not exist yet.
fn normalize(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
