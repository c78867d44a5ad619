//! Page rendering.
//!
//! # Responsibilities
//! - Serve a page fragment wrapped in the site template
//! - Serve the raw fragment when the client asks for it via `Accept`
//!
//! # Design Decisions
//! - Templating is a capability (`PageRenderer`); the bundled renderer only
//!   appends the fragment to the template body
//! - The fragment is captured when the page is (re)loaded; the template is
//!   read per request
//! - A missing template falls back to a bare HTML shell

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::header::ACCEPT;

use crate::handlers::{Handler, HandlerContext, HandlerError, HandlerFuture};
use crate::http::request::RequestView;
use crate::http::response::Reply;

const FALLBACK_TEMPLATE: &str = "<!DOCTYPE html>\n<html>\n<head></head>\n<body></body>\n</html>\n";

/// Combines a page fragment with the site template.
pub trait PageRenderer: Send + Sync {
    fn render_page(&self, template: &str, body_fragment: &str) -> String;
}

/// Appends the fragment at the end of the template's `<body>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BodyAppendRenderer;

impl PageRenderer for BodyAppendRenderer {
    fn render_page(&self, template: &str, body_fragment: &str) -> String {
        match template.to_ascii_lowercase().rfind("</body>") {
            Some(at) => {
                let mut out = String::with_capacity(template.len() + body_fragment.len());
                out.push_str(&template[..at]);
                out.push_str(body_fragment);
                out.push_str(&template[at..]);
                out
            }
            None => format!("{template}{body_fragment}"),
        }
    }
}

/// Settings shared by every page handler.
#[derive(Clone)]
pub struct PageSettings {
    pub template: PathBuf,
    pub raw_accept: String,
    pub renderer: Arc<dyn PageRenderer>,
}

impl PageSettings {
    pub fn new(template: impl Into<PathBuf>, raw_accept: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            raw_accept: raw_accept.into(),
            renderer: Arc::new(BodyAppendRenderer),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

impl fmt::Debug for PageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageSettings")
            .field("template", &self.template)
            .field("raw_accept", &self.raw_accept)
            .finish_non_exhaustive()
    }
}

/// Handler for one page file.
pub struct Page {
    source: PathBuf,
    fragment: String,
    settings: PageSettings,
}

impl Page {
    pub fn new(source: impl Into<PathBuf>, fragment: String, settings: PageSettings) -> Self {
        Self {
            source: source.into(),
            fragment,
            settings,
        }
    }

    /// Read `source` and build its handler.
    pub fn load(source: &Path, settings: PageSettings) -> std::io::Result<Self> {
        let fragment = std::fs::read_to_string(source)?;
        Ok(Self::new(source, fragment, settings))
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    async fn template(&self) -> Result<String, HandlerError> {
        match tokio::fs::read_to_string(&self.settings.template).await {
            Ok(t) => Ok(t),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(template = %self.settings.template.display(), "Template missing, using bare shell");
                Ok(FALLBACK_TEMPLATE.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Handler for Page {
    fn call<'a>(
        &'a self,
        req: &'a RequestView,
        reply: &'a mut Reply,
        _ctx: &'a HandlerContext,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let wants_raw = req
                .headers()
                .get(ACCEPT)
                .map(|v| v.as_bytes() == self.settings.raw_accept.as_bytes())
                .unwrap_or(false);

            if wants_raw {
                let raw = tokio::fs::read_to_string(&self.source).await?;
                reply.status(200).send_typed(raw, "text/html; charset=utf-8")?;
                return Ok(());
            }

            let template = self.template().await?;
            let html = self.settings.renderer.render_page(&template, &self.fragment);
            reply.status(200).html(html)?;
            Ok::<(), HandlerError>(())
        })
    }
}
