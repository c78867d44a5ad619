//! Site file watcher for hot reload.
//!
//! The `notify` callback runs on the watcher's own thread and only forwards
//! translated events into a channel. A single tokio task consumes them and
//! runs `RouteLoader::reconcile` one event at a time on the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::loader::RouteLoader;

/// Watcher setup failure. Serving continues without hot reload.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Created,
    Modified,
    Removed,
}

/// A filesystem change relevant to the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Map a raw notification onto zero or more watch events.
pub fn translate(event: &Event) -> Vec<WatchEvent> {
    let each = |kind: WatchKind| -> Vec<WatchEvent> {
        event.paths.iter().map(|p| WatchEvent::new(kind, p)).collect()
    };

    match event.kind {
        EventKind::Create(_) => each(WatchKind::Created),
        EventKind::Remove(_) => each(WatchKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(WatchKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(WatchKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => vec![
            WatchEvent::new(WatchKind::Removed, &event.paths[0]),
            WatchEvent::new(WatchKind::Created, &event.paths[1]),
        ],
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() { WatchKind::Created } else { WatchKind::Removed };
                WatchEvent::new(kind, p)
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => each(WatchKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Keeps the OS watcher alive; dropping it stops notifications.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watch `roots` recursively. Returns the watcher and its event stream.
    pub fn start(roots: &[PathBuf]) -> Result<(Self, mpsc::UnboundedReceiver<WatchEvent>), WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for change in translate(&event) {
                        if tx.send(change).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => tracing::error!(error = %e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for root in roots {
            watcher.watch(root, RecursiveMode::Recursive)?;
            tracing::info!(path = %root.display(), "Watching for changes");
        }

        Ok((
            Self {
                _watcher: watcher,
                roots: roots.to_vec(),
            },
            rx,
        ))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.roots.iter().any(|r| path.starts_with(r))
    }
}

/// Consume `events` until shutdown, reconciling each one in order.
pub fn spawn_reconciler(
    loader: Arc<RouteLoader>,
    mut events: mpsc::UnboundedReceiver<WatchEvent>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    tracing::debug!(kind = ?event.kind, path = %event.path.display(), "File change");
                    let loader = Arc::clone(&loader);
                    if let Err(e) = tokio::task::spawn_blocking(move || loader.reconcile(&event)).await {
                        tracing::error!(error = %e, "Reconcile task failed");
                    }
                }
            }
        }
        tracing::info!("Route watcher stopped");
    })
}
