//! Assignment handlers: create (idempotent) and delete.

use super::{db_error, not_found, ApiError};
use crate::control_plane::ControlPlaneState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct AssignmentCreateRequest {
    pub agent_id: String,
    pub region: String,
    pub pipeline_id: String,
}

/// POST /v1/assignments
///
/// Idempotent on (agent_id, region, pipeline_id): re-creating an existing
/// triple returns the existing assignment id. Missing agent or pipeline
/// is a 404, not a dangling foreign key.
pub async fn create_assignment(
    State(state): State<Arc<ControlPlaneState>>,
    Json(req): Json<AssignmentCreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = state.db.begin().await.map_err(db_error)?;

    let agent: Option<(String,)> = sqlx::query_as("SELECT id FROM agents WHERE id = ?")
        .bind(&req.agent_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
    if agent.is_none() {
        return Err(not_found("agent_not_found"));
    }

    let pipeline: Option<(String,)> = sqlx::query_as("SELECT id FROM pipelines WHERE id = ?")
        .bind(&req.pipeline_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;
    if pipeline.is_none() {
        return Err(not_found("pipeline_not_found"));
    }

    let existing: Option<(String,)> = sqlx::query_as(
        "SELECT id FROM assignments WHERE agent_id = ? AND region = ? AND pipeline_id = ?",
    )
    .bind(&req.agent_id)
    .bind(&req.region)
    .bind(&req.pipeline_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(db_error)?;

    if let Some((assignment_id,)) = existing {
        tx.commit().await.map_err(db_error)?;
        return Ok(Json(serde_json::json!({ "assignment_id": assignment_id })));
    }

    let assignment_id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO assignments (id, agent_id, region, pipeline_id, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&assignment_id)
    .bind(&req.agent_id)
    .bind(&req.region)
    .bind(&req.pipeline_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    info!(
        assignment_id = %assignment_id,
        agent_id = %req.agent_id,
        region = %req.region,
        pipeline_id = %req.pipeline_id,
        "assignment created"
    );
    Ok(Json(serde_json::json!({ "assignment_id": assignment_id })))
}

/// DELETE /v1/assignments/{assignment_id}
pub async fn delete_assignment(
    State(state): State<Arc<ControlPlaneState>>,
    Path(assignment_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(&assignment_id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(not_found("assignment_not_found"));
    }

    info!(assignment_id = %assignment_id, "assignment deleted");
    Ok(Json(serde_json::json!({"ok": true})))
}
