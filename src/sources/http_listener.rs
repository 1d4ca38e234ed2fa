//! HTTP listener source: a small ingest endpoint feeding a bounded queue.

use super::{Source, SourceError};
use crate::events::Event;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Receives events over HTTP and exposes them via `poll`.
///
/// `POST {path}` accepts `application/json` (object, array, or strings)
/// or any other content type as one raw text event. Accepted events go
/// into a bounded queue; when nothing in a request fits, the handler
/// answers 429 so the sender can back off.
pub struct HttpListenerSource {
    rx: mpsc::Receiver<Event>,
    local_addr: SocketAddr,
    dropped: Arc<AtomicU64>,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
}

#[derive(Clone)]
struct ListenerState {
    tx: mpsc::Sender<Event>,
    path: String,
    dropped: Arc<AtomicU64>,
}

impl HttpListenerSource {
    /// Default ingest route when the spec does not set one.
    pub const DEFAULT_PATH: &'static str = "/ingest";

    /// Bind the listener and start serving in the background.
    pub async fn bind(
        host: &str,
        port: u16,
        path: &str,
        max_queue_size: usize,
    ) -> Result<Self, SourceError> {
        let route_path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        let addr = format!("{host}:{port}");
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|err| SourceError::Bind { addr: addr.clone(), err })?;
        let local_addr = listener.local_addr()?;

        let (tx, rx) = mpsc::channel(max_queue_size.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let state = ListenerState {
            tx,
            path: route_path.clone(),
            dropped: Arc::clone(&dropped),
        };

        let app = Router::new()
            .route(&route_path, post(ingest))
            .route("/v1/health", get(health))
            .with_state(state);

        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();
        let server = tokio::spawn(async move {
            let serve = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await });
            if let Err(e) = serve.await {
                tracing::warn!(error = %e, "HTTP listener server stopped");
            }
        });

        debug!(addr = %local_addr, path = %route_path, "HTTP listener source serving");
        Ok(Self {
            rx,
            local_addr,
            dropped,
            shutdown,
            server,
        })
    }

    /// The bound address (useful when port 0 was requested).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({"ok": true}))
}

async fn ingest(
    State(state): State<ListenerState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    if body.is_empty() {
        return (StatusCode::BAD_REQUEST, "empty body").into_response();
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let meta = request_meta(&state.path, remote, user_agent);

    let mut events: Vec<Event> = Vec::new();
    if content_type.contains("application/json") {
        let payload: Value = match serde_json::from_slice(&body) {
            Ok(v) => v,
            Err(_) => return (StatusCode::BAD_REQUEST, "invalid json").into_response(),
        };

        match payload {
            Value::Array(items) => {
                for item in items {
                    if let Some(evt) = event_from_item(&item, &meta) {
                        events.push(evt);
                    }
                }
            }
            other => {
                if let Some(evt) = event_from_item(&other, &meta) {
                    events.push(evt);
                }
            }
        }
    } else {
        let raw = String::from_utf8_lossy(&body).trim().to_string();
        if !raw.is_empty() {
            let mut evt = Event::from_raw(raw);
            evt.meta = meta.clone();
            events.push(evt);
        }
    }

    let mut accepted = 0usize;
    for evt in events {
        match state.tx.try_send(evt) {
            Ok(()) => accepted += 1,
            Err(mpsc::error::TrySendError::Full(_)) => {
                state.dropped.fetch_add(1, Ordering::Relaxed);
                break;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => break,
        }
    }

    if accepted == 0 {
        (StatusCode::TOO_MANY_REQUESTS, "queue full").into_response()
    } else {
        (StatusCode::ACCEPTED, format!("accepted={accepted}")).into_response()
    }
}

fn request_meta(path: &str, remote: SocketAddr, user_agent: Option<String>) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert("source".to_string(), Value::from("http_listener"));
    meta.insert("path".to_string(), Value::from(path));
    meta.insert("client".to_string(), Value::from(remote.ip().to_string()));
    meta.insert(
        "user_agent".to_string(),
        user_agent.map_or(Value::Null, Value::from),
    );
    meta
}

/// Convert one JSON item into an event.
///
/// Strings become raw events; objects keep their non-`raw` fields in
/// `structured` (with the whole object serialized as `raw` when no `raw`
/// string is present); other scalars are stringified.
fn event_from_item(item: &Value, meta: &Map<String, Value>) -> Option<Event> {
    match item {
        Value::String(s) => {
            let raw = s.trim();
            if raw.is_empty() {
                return None;
            }
            let mut evt = Event::from_raw(raw);
            evt.meta = meta.clone();
            Some(evt)
        }
        Value::Object(obj) => {
            let raw = match obj.get("raw").and_then(Value::as_str) {
                Some(s) => s.trim().to_string(),
                None => Value::Object(obj.clone()).to_string(),
            };
            let mut structured = Map::new();
            for (k, v) in obj {
                if k != "raw" {
                    structured.insert(k.clone(), v.clone());
                }
            }
            let mut evt = Event::from_raw(raw);
            evt.structured = structured;
            evt.meta = meta.clone();
            Some(evt)
        }
        other => {
            let raw = other.to_string();
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            let mut evt = Event::from_raw(raw);
            evt.meta = meta.clone();
            Some(evt)
        }
    }
}

#[async_trait]
impl Source for HttpListenerSource {
    async fn poll(&mut self, max_events: usize) -> Result<Vec<Event>, SourceError> {
        let mut out = Vec::new();
        while out.len() < max_events {
            match self.rx.try_recv() {
                Ok(evt) => out.push(evt),
                Err(_) => break,
            }
        }
        Ok(out)
    }

    fn close(&mut self) {
        self.shutdown.cancel();
        self.server.abort();
        self.rx.close();
    }

    fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for HttpListenerSource {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.server.abort();
    }
}
