//! Liveness probe.

use axum::Json;
use serde_json::Value;

/// GET /healthz
pub async fn healthz() -> Json<Value> {
    Json(serde_json::json!({"ok": true}))
}
