//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use hotroute::config::ServerConfig;
use hotroute::lifecycle::{bootstrap_with, App, Extensions};

/// A site laid out in a temporary directory.
pub struct TestSite {
    _dir: TempDir,
    pub root: PathBuf,
}

impl TestSite {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        for sub in ["api", "pages", "public", "middleware"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        Self { _dir: dir, root }
    }

    /// Site with the article API, a page, a stylesheet and the template.
    pub fn sample() -> Self {
        let site = Self::new();
        site.write("api/article.get.toml", "handler = \"article.list\"\n");
        site.write("api/article.post.toml", "handler = \"article.create\"\n");
        site.write("api/article/[id].put.toml", "handler = \"article.update\"\n");
        site.write("api/article/[name].delete.toml", "handler = \"article.delete\"\n");
        site.write("pages/index.html", "<h1>home</h1>");
        site.write("pages/docs/index.html", "<h1>docs</h1>");
        site.write("public/css/site.css", "body{}");
        site.write("template.html", "<html><body><nav></nav></body></html>");
        site
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn remove(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::remove_file(&path).unwrap();
        path
    }

    pub fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".into();
        config.folders.api = self.path("api");
        config.folders.pages = self.path("pages");
        config.folders.public = self.path("public");
        config.folders.middleware = self.path("middleware");
        config.pages.template = self.path("template.html");
        config.watch.enabled = false;
        config
    }

    pub fn app(&self) -> App {
        self.app_with(self.config(), Extensions::default())
    }

    pub fn app_with(&self, config: ServerConfig, extensions: Extensions) -> App {
        bootstrap_with(config, extensions).unwrap()
    }
}

/// A response collected in full.
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }
}

/// Drive one request through the router without a socket.
pub async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> Reply {
    send_with(router, method, uri, body, &[]).await
}

pub async fn send_with(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<&str>,
    headers: &[(&str, &str)],
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_owned())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply { status, headers, body }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
