//! Directory walking and route pattern derivation.
//!
//! | Root       | File                           | Pattern          | Method |
//! |------------|--------------------------------|------------------|--------|
//! | api        | `article.get.toml`             | `/article`       | GET    |
//! | api        | `article/[id].put.toml`        | `/article/:id`   | PUT    |
//! | api        | `health.toml`                  | `/health`        | ALL    |
//! | pages      | `blog/index.html`              | `/blog/`         | GET    |
//! | pages      | `index.html`                   | `/`              | GET    |
//! | public     | `css/site.css`                 | `/css/site.css`  | GET    |

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::loader::RouteLoadError;
use crate::routing::MethodFilter;

/// The kind of content a root holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    Api,
    Pages,
    Public,
    Middleware,
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RootKind::Api => "api",
            RootKind::Pages => "pages",
            RootKind::Public => "public",
            RootKind::Middleware => "middleware",
        })
    }
}

/// Recursively list the files under `root`, sorted by name at every level.
///
/// A missing root yields nothing. Unreadable directories are logged and skipped.
pub fn walk(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if root.is_dir() {
        walk_into(root, &mut files);
    }
    files
}

fn walk_into(dir: &Path, files: &mut Vec<PathBuf>) {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot read directory");
            return;
        }
    };
    entries.sort();

    for path in entries {
        if is_ignored(&path) {
            continue;
        }
        if path.is_dir() {
            walk_into(&path, files);
        } else {
            files.push(path);
        }
    }
}

/// Hidden files and editor scratch files never become routes.
pub fn is_ignored(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    name.starts_with('.')
        || name.ends_with('~')
        || name.ends_with(".swp")
        || name.ends_with(".swx")
        || name.ends_with(".tmp")
        || name == "4913"
}

/// URL segments of `file` relative to `root`.
fn relative_segments(root: &Path, file: &Path) -> Result<Vec<String>, RouteLoadError> {
    let relative = file.strip_prefix(root).map_err(|_| RouteLoadError::InvalidPath {
        path: file.to_path_buf(),
        reason: format!("not under {}", root.display()),
    })?;

    relative
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str().map(str::to_owned).ok_or_else(|| RouteLoadError::InvalidPath {
                path: file.to_path_buf(),
                reason: "not valid UTF-8".into(),
            }),
            _ => Err(RouteLoadError::InvalidPath {
                path: file.to_path_buf(),
                reason: "unexpected path component".into(),
            }),
        })
        .collect()
}

/// `[name]` becomes `:name`; other segments pass through.
fn param_segment(segment: &str) -> String {
    match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(name) if !name.is_empty() => format!(":{name}"),
        _ => segment.to_owned(),
    }
}

/// Pattern from directories plus the first dot-part of the file name.
fn stem_pattern(mut segments: Vec<String>) -> String {
    if let Some(last) = segments.last_mut() {
        let stem = last.split('.').next().unwrap_or_default().to_owned();
        *last = stem;
    }
    let joined: Vec<String> = segments.iter().map(|s| param_segment(s)).collect();
    format!("/{}", joined.join("/"))
}

/// Pattern and method of an API file.
pub fn api_route(root: &Path, file: &Path) -> Result<(String, MethodFilter), RouteLoadError> {
    let segments = relative_segments(root, file)?;
    let name = segments.last().cloned().unwrap_or_default();

    let parts: Vec<&str> = name.split('.').collect();
    let method = if parts.len() == 3 {
        parts[1].parse::<MethodFilter>().map_err(|_| RouteLoadError::InvalidMethod {
            path: file.to_path_buf(),
            method: parts[1].to_owned(),
        })?
    } else {
        MethodFilter::All
    };

    Ok((stem_pattern(segments), method))
}

/// Pattern of a page file; a trailing `index` collapses to its directory.
pub fn page_pattern(root: &Path, file: &Path) -> Result<String, RouteLoadError> {
    let pattern = stem_pattern(relative_segments(root, file)?);
    Ok(match pattern.strip_suffix("index") {
        Some(parent) if parent.ends_with('/') => parent.to_owned(),
        _ => pattern,
    })
}

/// Pattern of a static file: its relative path verbatim.
pub fn static_pattern(root: &Path, file: &Path) -> Result<String, RouteLoadError> {
    Ok(format!("/{}", relative_segments(root, file)?.join("/")))
}
