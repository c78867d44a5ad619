//! Static file serving.
//!
//! One handler per file under the public root. The file is read on every
//! request so content edits need no reload; a file that vanished before the
//! watcher caught up leaves the reply pending and the request falls through
//! to the 404 envelope.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::handlers::{Handler, HandlerContext, HandlerError, HandlerFuture};
use crate::http::request::RequestView;
use crate::http::response::Reply;

/// Serves the bytes of a single file.
#[derive(Debug, Clone)]
pub struct StaticFile {
    path: PathBuf,
    content_type: &'static str,
}

impl StaticFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = content_type(&path);
        Self { path, content_type }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }
}

impl Handler for StaticFile {
    fn call<'a>(
        &'a self,
        _req: &'a RequestView,
        reply: &'a mut Reply,
        _ctx: &'a HandlerContext,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            match tokio::fs::read(&self.path).await {
                Ok(bytes) => {
                    reply.status(200).send_typed(bytes, self.content_type)?;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %self.path.display(), "Static file disappeared");
                }
                Err(e) => return Err(HandlerError::Io(e)),
            }
            Ok::<(), HandlerError>(())
        })
    }
}

/// Content type inferred from the file extension.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
