//! WebSocket upgrade and socket lifecycle.
//!
//! # Responsibilities
//! - Decide whether a request path belongs to the WebSocket registration
//! - Complete the upgrade handshake through axum
//! - Drive the `SocketHandler` hooks for the lifetime of the socket
//!
//! # Data Flow
//! ```text
//! Client ── frames ──▶ reader loop ──▶ SocketHandler::on_message
//!                                        │ conn.send(..)
//!                                        ▼
//! Client ◀── frames ── writer task ◀── mpsc queue ──▶ on_drain when emptied
//! ```
//!
//! # Design Decisions
//! - At most one registration per server; patterns are regexes
//! - Outgoing frames are queued so hooks never await the network
//! - Ping/pong is answered by the transport and never reaches the hooks
//! - On exit a close frame is queued behind pending frames, so they flush first

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt, StreamExt};
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Upper bound on flushing queued frames after the reader stops.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an upgraded socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// A message received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketMessage {
    Text(String),
    Binary(Bytes),
}

/// Handle to an open socket, passed to every hook.
#[derive(Clone)]
pub struct SocketConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Message>,
    queued: Arc<AtomicUsize>,
}

impl SocketConnection {
    fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: ConnectionId::new(),
            tx,
            queued: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame. Returns `false` once the socket is gone.
    pub fn send(&self, text: impl Into<String>) -> bool {
        self.enqueue(Message::Text(text.into().into()))
    }

    /// Queue a binary frame. Returns `false` once the socket is gone.
    pub fn send_binary(&self, bytes: impl Into<Bytes>) -> bool {
        self.enqueue(Message::Binary(bytes.into()))
    }

    /// Frames queued but not yet written.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    fn enqueue(&self, message: Message) -> bool {
        self.queued.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(message).is_err() {
            self.queued.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }
}

impl fmt::Debug for SocketConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketConnection")
            .field("id", &self.id)
            .field("queued", &self.queued())
            .finish()
    }
}

/// Lifecycle hooks of an upgraded socket.
pub trait SocketHandler: Send + Sync {
    fn on_open<'a>(&'a self, conn: &'a SocketConnection) -> BoxFuture<'a, ()>;

    fn on_message<'a>(&'a self, conn: &'a SocketConnection, message: SocketMessage) -> BoxFuture<'a, ()>;

    fn on_close<'a>(&'a self, conn: &'a SocketConnection) -> BoxFuture<'a, ()>;

    /// Called when the outgoing queue has been flushed.
    fn on_drain<'a>(&'a self, conn: &'a SocketConnection) -> BoxFuture<'a, ()>;
}

/// Handler that only logs socket activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSocketHandler;

impl SocketHandler for LoggingSocketHandler {
    fn on_open<'a>(&'a self, conn: &'a SocketConnection) -> BoxFuture<'a, ()> {
        Box::pin(async move { info!(connection = %conn.id(), "WebSocket opened") })
    }

    fn on_message<'a>(&'a self, conn: &'a SocketConnection, message: SocketMessage) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match message {
                SocketMessage::Text(text) => info!(connection = %conn.id(), message = %text, "WebSocket message received"),
                SocketMessage::Binary(bytes) => info!(connection = %conn.id(), bytes = bytes.len(), "WebSocket binary message received"),
            }
        })
    }

    fn on_close<'a>(&'a self, conn: &'a SocketConnection) -> BoxFuture<'a, ()> {
        Box::pin(async move { info!(connection = %conn.id(), "WebSocket closed") })
    }

    fn on_drain<'a>(&'a self, conn: &'a SocketConnection) -> BoxFuture<'a, ()> {
        Box::pin(async move { debug!(connection = %conn.id(), "WebSocket drained") })
    }
}

/// Paths eligible for upgrade plus the handler serving them.
pub struct WebSocketRegistration {
    pub patterns: Vec<Regex>,
    pub handler: Arc<dyn SocketHandler>,
}

impl WebSocketRegistration {
    pub fn new(patterns: Vec<Regex>, handler: Arc<dyn SocketHandler>) -> Self {
        Self { patterns, handler }
    }

    /// Registration backed by [`LoggingSocketHandler`].
    pub fn logging(patterns: Vec<Regex>) -> Self {
        Self::new(patterns, Arc::new(LoggingSocketHandler))
    }

    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(path))
    }

    /// Finish the handshake and hand the socket to the registered hooks.
    pub fn accept(&self, upgrade: WebSocketUpgrade) -> Response {
        let handler = Arc::clone(&self.handler);
        upgrade.on_upgrade(move |socket| serve_socket(socket, handler))
    }
}

impl fmt::Debug for WebSocketRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<&str> = self.patterns.iter().map(Regex::as_str).collect();
        f.debug_struct("WebSocketRegistration")
            .field("patterns", &patterns)
            .finish_non_exhaustive()
    }
}

async fn serve_socket(socket: WebSocket, handler: Arc<dyn SocketHandler>) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let conn = SocketConnection::new(tx);

    handler.on_open(&conn).await;

    let mut writer = tokio::spawn(write_frames(sink, rx, conn.clone(), Arc::clone(&handler)));

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handler.on_message(&conn, SocketMessage::Text(text.as_str().to_owned())).await
            }
            Ok(Message::Binary(bytes)) => handler.on_message(&conn, SocketMessage::Binary(bytes)).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = %conn.id(), error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    conn.enqueue(Message::Close(None));
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        debug!(connection = %conn.id(), "WebSocket flush timed out");
        writer.abort();
    }
    handler.on_close(&conn).await;
}

/// Write queued frames in order until a close frame has gone out.
async fn write_frames<S>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<Message>,
    conn: SocketConnection,
    handler: Arc<dyn SocketHandler>,
) where
    S: Sink<Message> + Unpin,
    S::Error: fmt::Display,
{
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!(connection = %conn.id(), error = %e, "WebSocket write failed");
            break;
        }
        let drained = conn.queued.fetch_sub(1, Ordering::AcqRel) == 1;
        if closing {
            break;
        }
        if drained {
            handler.on_drain(&conn).await;
        }
    }
}
