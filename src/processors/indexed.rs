//! Indexed processor: normalize raw lines through the indexer service.

use super::{Processor, ProcessorError};
use crate::events::Event;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde_json::{Map, Value};
use std::time::Duration;

const NORMALIZE_PATH: &str = "/v1/normalize";

pub const DEFAULT_TIMEOUT_SECONDS: f64 = 10.0;
pub const DEFAULT_PROFILE: &str = "passthrough";

/// Options accepted by [`IndexedProcessor::new`].
#[derive(Debug, Clone, serde::Deserialize)]
pub struct IndexedOptions {
    /// Full normalize endpoint; preferred over `indexer_url` when both set.
    #[serde(default)]
    pub normalize_url: Option<String>,
    /// Indexer base URL; `/v1/normalize` is appended.
    #[serde(default)]
    pub indexer_url: Option<String>,
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_include_meta")]
    pub include_meta: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_include_meta() -> bool {
    true
}

fn default_timeout_seconds() -> f64 {
    DEFAULT_TIMEOUT_SECONDS
}

/// Rewrite an indexer URL so its path ends in exactly `/v1/normalize`.
///
/// Operators paste base URLs, full endpoints, and occasionally endpoints
/// with the suffix doubled; all collapse to one canonical endpoint.
fn normalize_indexer_url(base: &str) -> Result<String, ProcessorError> {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return Err(ProcessorError::InvalidUrl("indexer URL is empty".to_string()));
    }

    let mut url = Url::parse(trimmed)
        .map_err(|e| ProcessorError::InvalidUrl(format!("{trimmed}: {e}")))?;
    if !url.has_host() {
        return Err(ProcessorError::InvalidUrl(format!(
            "indexer URL must include scheme and host, got: {trimmed}"
        )));
    }

    let mut path = url.path().trim_end_matches('/').to_string();
    while path.ends_with(NORMALIZE_PATH) {
        path.truncate(path.len() - NORMALIZE_PATH.len());
        while path.ends_with('/') {
            path.pop();
        }
    }
    path.push_str(NORMALIZE_PATH);

    url.set_path(&path);
    Ok(url.to_string())
}

/// Pull the list of normalized documents out of an indexer response.
///
/// Accepted shapes: a bare list of objects, `{"events": [...]}`,
/// `{"event": {...}}`, `{"docs": [...]}`, `{"doc": {...}}`.
fn extract_docs(data: &Value) -> Result<Vec<Map<String, Value>>, ProcessorError> {
    fn objects(items: &[Value]) -> Option<Vec<Map<String, Value>>> {
        items
            .iter()
            .map(|v| v.as_object().cloned())
            .collect::<Option<Vec<_>>>()
    }

    if let Value::Array(items) = data {
        return objects(items)
            .ok_or_else(|| ProcessorError::InvalidResponse("list contains non-objects".to_string()));
    }

    let Value::Object(obj) = data else {
        return Err(ProcessorError::InvalidResponse(
            "response is not an object or list".to_string(),
        ));
    };

    if let Some(Value::Array(items)) = obj.get("events") {
        if let Some(docs) = objects(items) {
            return Ok(docs);
        }
    }
    if let Some(Value::Object(event)) = obj.get("event") {
        return Ok(vec![event.clone()]);
    }
    if let Some(Value::Array(items)) = obj.get("docs") {
        if let Some(docs) = objects(items) {
            return Ok(docs);
        }
    }
    if let Some(Value::Object(doc)) = obj.get("doc") {
        return Ok(vec![doc.clone()]);
    }

    Err(ProcessorError::InvalidResponse(
        "missing events/event/docs/doc key".to_string(),
    ))
}

/// Derive a non-empty message from a normalized document.
fn doc_message(doc: &Map<String, Value>, fallback: &str) -> String {
    for key in ["raw", "message", "text", "line", "body"] {
        if let Some(s) = doc.get(key).and_then(Value::as_str) {
            if !s.trim().is_empty() {
                return s.to_string();
            }
        }
    }
    fallback.to_string()
}

/// Convert a normalized document into an Event.
///
/// Only fields the Event schema recognizes survive; `raw` is always
/// populated (from the document, else the original line).
fn doc_to_event(doc: &Map<String, Value>, fallback_raw: &str) -> Event {
    let raw = doc_message(doc, fallback_raw);

    let ts = doc
        .get("ts")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |dt| dt.with_timezone(&Utc));

    let structured = doc
        .get("structured")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let meta = doc
        .get("meta")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Event {
        ts,
        raw,
        structured,
        meta,
    }
}

/// Sends each raw line to the indexer's `/v1/normalize` endpoint and
/// replaces the batch with the normalized events.
///
/// The endpoint is documented single-document per call, so this issues
/// one request per input event.
pub struct IndexedProcessor {
    client: reqwest::Client,
    normalize_url: String,
    profile: String,
    include_meta: bool,
}

impl IndexedProcessor {
    pub fn new(options: IndexedOptions) -> Result<Self, ProcessorError> {
        let base = options
            .normalize_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(options.indexer_url.as_deref())
            .unwrap_or("");
        let normalize_url = normalize_indexer_url(base)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(options.timeout_seconds.max(0.1)))
            .build()?;

        Ok(Self {
            client,
            normalize_url,
            profile: options.profile,
            include_meta: options.include_meta,
        })
    }

    async fn normalize_one(&self, raw: &str) -> Result<Vec<Event>, ProcessorError> {
        let payload = serde_json::json!({
            "profile": self.profile,
            "raw": raw,
            "include_meta": self.include_meta,
        });

        let resp = self
            .client
            .post(&self.normalize_url)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProcessorError::InvalidRequest(body));
        }
        if !status.is_success() {
            return Err(ProcessorError::ServerStatus(status));
        }

        let data: Value = resp.json().await?;
        let docs = extract_docs(&data)?;
        if docs.is_empty() {
            return Err(ProcessorError::EmptyResponse);
        }

        Ok(docs.iter().map(|d| doc_to_event(d, raw)).collect())
    }
}

#[async_trait]
impl Processor for IndexedProcessor {
    async fn process(&self, events: &[Event]) -> Result<Vec<Event>, ProcessorError> {
        let mut out = Vec::with_capacity(events.len());
        for event in events {
            out.extend(self.normalize_one(&event.raw).await?);
        }
        Ok(out)
    }
}
