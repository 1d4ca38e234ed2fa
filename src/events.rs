//! Event is the internal record transported through a pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single log event flowing from a source to a destination.
///
/// `raw` is the original line (never empty for emitted events).
/// `structured` holds fields extracted by sources or the indexer.
/// `meta` is stamped by the engine: agent_id, region, tenant_id,
/// pipeline name and pipeline_id, plus per-source context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default = "Utc::now")]
    pub ts: DateTime<Utc>,
    pub raw: String,
    #[serde(default)]
    pub structured: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl Event {
    /// Create an event carrying only a raw line, timestamped now.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            raw: raw.into(),
            structured: Map::new(),
            meta: Map::new(),
        }
    }

    /// Attach a meta field, builder-style.
    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_json() {
        let evt = Event::from_raw("error: disk full").with_meta("source", "syslog_udp");

        let json = serde_json::to_string(&evt).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(back.raw, "error: disk full");
        assert_eq!(back.meta.get("source").and_then(Value::as_str), Some("syslog_udp"));
        assert!(back.structured.is_empty());
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let evt: Event = serde_json::from_str(r#"{"raw":"hello"}"#).unwrap();
        assert_eq!(evt.raw, "hello");
        assert!(evt.structured.is_empty());
        assert!(evt.meta.is_empty());
    }

    #[test]
    fn test_meta_builder_accumulates() {
        let evt = Event::from_raw("line")
            .with_meta("agent_id", "a1")
            .with_meta("region", "eu");
        assert_eq!(evt.meta.get("agent_id").and_then(Value::as_str), Some("a1"));
        assert_eq!(evt.meta.get("region").and_then(Value::as_str), Some("eu"));
    }
}
