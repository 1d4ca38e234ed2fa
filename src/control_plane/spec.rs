//! Pipeline spec blob handling: normalization, sanitization, assignment ETag.
//!
//! Spec blobs arrive from operators in the canonical shape or wrapped in
//! one or two layers of `{"spec": ...}` (old tooling did this). On write
//! the blob is unwrapped and stripped of control-plane-owned keys; on read
//! it is re-joined with pipeline metadata into the agent-facing DTO.

use crate::types::{
    default_batch_max_events, default_batch_max_seconds, DestinationConfig, PipelineSpec,
    ProcessorConfig, SourceConfig,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Keys owned by pipeline metadata, never stored inside the spec blob.
const RESERVED_KEYS: [&str; 4] = ["pipeline_id", "name", "enabled", "version"];

#[derive(Debug, Error)]
pub enum SpecReadError {
    #[error("pipeline_spec_invalid_missing_source_or_destination")]
    MissingSourceOrDestination,
    #[error("pipeline spec is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Unwrap a spec blob to its canonical mapping.
///
/// A level is unwrapped only when it does not already look canonical
/// (no `source`/`destination`/`processor` key) and carries a `spec`
/// mapping; at most two levels are peeled.
pub fn normalize_spec(spec: &Value) -> Map<String, Value> {
    let mut current = match spec.as_object() {
        Some(obj) => obj.clone(),
        None => return Map::new(),
    };

    for _ in 0..2 {
        let looks_canonical = current.contains_key("source")
            || current.contains_key("destination")
            || current.contains_key("processor");
        if looks_canonical {
            return current;
        }
        match current.get("spec").and_then(Value::as_object) {
            Some(inner) => current = inner.clone(),
            None => return current,
        }
    }
    current
}

/// Normalize and strip metadata keys; this is what gets persisted.
pub fn sanitize_spec(spec: &Value) -> Map<String, Value> {
    let mut cleaned = normalize_spec(spec);
    for key in RESERVED_KEYS {
        cleaned.remove(key);
    }
    cleaned
}

/// Re-join a stored spec blob with pipeline metadata into the agent DTO.
///
/// A stored blob missing `source` or `destination` is served as a 500
/// rather than shipping an unrunnable spec to agents.
pub fn to_pipeline_spec(
    pipeline_id: &str,
    name: &str,
    enabled: bool,
    stored_spec: &str,
) -> Result<PipelineSpec, SpecReadError> {
    let value: Value = serde_json::from_str(stored_spec)?;
    let spec = normalize_spec(&value);

    let source: SourceConfig = match spec.get("source").and_then(Value::as_object) {
        Some(obj) if !obj.is_empty() => serde_json::from_value(Value::Object(obj.clone()))?,
        _ => return Err(SpecReadError::MissingSourceOrDestination),
    };
    let destination: DestinationConfig = match spec.get("destination").and_then(Value::as_object) {
        Some(obj) if !obj.is_empty() => serde_json::from_value(Value::Object(obj.clone()))?,
        _ => return Err(SpecReadError::MissingSourceOrDestination),
    };
    let processor: ProcessorConfig = match spec.get("processor") {
        Some(Value::Object(obj)) => serde_json::from_value(Value::Object(obj.clone()))?,
        _ => ProcessorConfig::default(),
    };

    let batch_max_events = spec
        .get("batch_max_events")
        .and_then(Value::as_u64)
        .map_or_else(default_batch_max_events, |v| v.clamp(1, u64::from(u32::MAX)) as u32);
    let batch_max_seconds = spec
        .get("batch_max_seconds")
        .and_then(Value::as_f64)
        .map_or_else(default_batch_max_seconds, |v| v.max(0.1));

    Ok(PipelineSpec {
        pipeline_id: pipeline_id.to_string(),
        name: name.to_string(),
        enabled,
        source,
        processor,
        destination,
        batch_max_events,
        batch_max_seconds,
    })
}

/// One row of the ETag basis. Field order is the canonical (sorted) key
/// order of the serialized JSON.
#[derive(Debug, Serialize)]
pub struct EtagRow {
    pub assignment_id: String,
    pub pipeline_id: String,
    pub updated_at: String,
    pub version: i64,
}

impl EtagRow {
    pub fn new(
        assignment_id: &str,
        pipeline_id: &str,
        version: i64,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            assignment_id: assignment_id.to_string(),
            pipeline_id: pipeline_id.to_string(),
            updated_at: updated_at.to_rfc3339(),
            version,
        }
    }
}

/// SHA-256 over the compact canonical serialization of the basis rows.
///
/// The basis deliberately excludes agent state (`last_seen_at`), so pulls
/// are stable until an assignment or a bound pipeline version changes.
pub fn compute_etag(rows: &[EtagRow]) -> String {
    let body = serde_json::to_string(rows).unwrap_or_default();
    let digest = Sha256::digest(body.as_bytes());
    format!("{digest:x}")
}
