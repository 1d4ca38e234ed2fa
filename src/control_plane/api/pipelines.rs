//! Pipeline handlers: create, update, list.

use super::{db_error, not_found, ApiError};
use crate::control_plane::spec::sanitize_spec;
use crate::control_plane::ControlPlaneState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct PipelineCreateRequest {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Runtime spec: source/processor/destination/batching. Metadata keys
    /// (`pipeline_id`, `name`, `enabled`, `version`) are stripped on write.
    pub spec: Value,
}

#[derive(Debug, Deserialize)]
pub struct PipelineUpdateRequest {
    pub name: String,
    pub enabled: bool,
    pub spec: Value,
}

#[derive(Debug, Serialize)]
pub struct PipelineResponse {
    pub pipeline_id: String,
    pub name: String,
    pub enabled: bool,
    pub version: i64,
    pub spec: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /v1/pipelines
pub async fn create_pipeline(
    State(state): State<Arc<ControlPlaneState>>,
    Json(req): Json<PipelineCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let pipeline_id = uuid::Uuid::new_v4().to_string();
    let cleaned = sanitize_spec(&req.spec);
    let stored = Value::Object(cleaned).to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO pipelines (id, name, enabled, version, spec, created_at, updated_at)
         VALUES (?, ?, ?, 1, ?, ?, ?)",
    )
    .bind(&pipeline_id)
    .bind(&req.name)
    .bind(req.enabled)
    .bind(&stored)
    .bind(now)
    .bind(now)
    .execute(&state.db)
    .await
    .map_err(db_error)?;

    info!(pipeline_id = %pipeline_id, name = %req.name, "pipeline created");
    Ok(Json(serde_json::json!({ "pipeline_id": pipeline_id })))
}

/// PUT /v1/pipelines/{pipeline_id}
///
/// Every update bumps `version` and `updated_at`, even when the spec is
/// byte-identical; agents key restarts off the version.
pub async fn update_pipeline(
    State(state): State<Arc<ControlPlaneState>>,
    Path(pipeline_id): Path<String>,
    Json(req): Json<PipelineUpdateRequest>,
) -> Result<Json<Value>, ApiError> {
    let cleaned = sanitize_spec(&req.spec);
    let stored = Value::Object(cleaned).to_string();

    let result = sqlx::query(
        "UPDATE pipelines
         SET name = ?, enabled = ?, spec = ?, version = version + 1, updated_at = ?
         WHERE id = ?",
    )
    .bind(&req.name)
    .bind(req.enabled)
    .bind(&stored)
    .bind(Utc::now())
    .bind(&pipeline_id)
    .execute(&state.db)
    .await
    .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(not_found("pipeline_not_found"));
    }

    info!(pipeline_id = %pipeline_id, "pipeline updated");
    Ok(Json(serde_json::json!({"ok": true})))
}

/// GET /v1/pipelines
pub async fn list_pipelines(
    State(state): State<Arc<ControlPlaneState>>,
) -> Result<Json<Value>, ApiError> {
    let rows: Vec<(String, String, bool, i64, String, DateTime<Utc>, DateTime<Utc>)> =
        sqlx::query_as(
            "SELECT id, name, enabled, version, spec, created_at, updated_at
             FROM pipelines ORDER BY created_at ASC",
        )
        .fetch_all(&state.db)
        .await
        .map_err(db_error)?;

    let pipelines: Vec<PipelineResponse> = rows
        .into_iter()
        .map(|(pipeline_id, name, enabled, version, spec, created_at, updated_at)| {
            PipelineResponse {
                pipeline_id,
                name,
                enabled,
                version,
                spec: serde_json::from_str(&spec).unwrap_or(Value::Null),
                created_at,
                updated_at,
            }
        })
        .collect();

    Ok(Json(serde_json::json!({ "pipelines": pipelines })))
}
