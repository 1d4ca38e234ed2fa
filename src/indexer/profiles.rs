//! Built-in normalization profiles.

use serde_json::{Map, Value};

/// `passthrough`: wrap the raw line as `{"message": raw}`.
pub fn passthrough(raw: &str) -> Map<String, Value> {
    let mut doc = Map::new();
    doc.insert("message".to_string(), Value::from(raw));
    doc
}

/// `json_auto`: parse JSON objects, keep everything else as a message.
///
/// Non-object JSON values are preserved under `value` next to the
/// original line.
pub fn json_auto(raw: &str) -> Map<String, Value> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return passthrough(raw);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => obj,
        Ok(other) => {
            let mut doc = Map::new();
            doc.insert("value".to_string(), other);
            doc.insert("message".to_string(), Value::from(raw));
            doc
        }
        Err(_) => passthrough(raw),
    }
}

/// `kv_pairs`: split whitespace-separated `key=value` tokens.
///
/// Tokens without `=` are ignored; a line yielding no pairs falls back
/// to `{"message": raw}`.
pub fn kv_pairs(raw: &str) -> Map<String, Value> {
    let mut doc = Map::new();
    for token in raw.split_whitespace() {
        if let Some((key, value)) = token.split_once('=') {
            doc.insert(key.trim().to_string(), Value::from(value.trim()));
        }
    }
    if doc.is_empty() {
        return passthrough(raw);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let doc = passthrough("hello world");
        assert_eq!(doc.get("message").and_then(Value::as_str), Some("hello world"));
    }

    #[test]
    fn test_json_auto_object() {
        let doc = json_auto(r#"{"level": "info", "code": 3}"#);
        assert_eq!(doc.get("level").and_then(Value::as_str), Some("info"));
        assert_eq!(doc.get("code").and_then(Value::as_u64), Some(3));
    }

    #[test]
    fn test_json_auto_falls_back_on_invalid() {
        let doc = json_auto("{broken json");
        assert_eq!(doc.get("message").and_then(Value::as_str), Some("{broken json"));

        let doc = json_auto("plain text");
        assert_eq!(doc.get("message").and_then(Value::as_str), Some("plain text"));
    }

    #[test]
    fn test_kv_pairs() {
        let doc = kv_pairs("level=warn service=auth retries=3 loose");
        assert_eq!(doc.get("level").and_then(Value::as_str), Some("warn"));
        assert_eq!(doc.get("service").and_then(Value::as_str), Some("auth"));
        assert_eq!(doc.get("retries").and_then(Value::as_str), Some("3"));
        assert!(!doc.contains_key("loose"));
    }

    #[test]
    fn test_kv_pairs_fallback() {
        let doc = kv_pairs("no pairs here");
        assert_eq!(doc.get("message").and_then(Value::as_str), Some("no pairs here"));
    }
}
