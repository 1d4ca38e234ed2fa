//! Agent handlers: register, heartbeat, list, assignment pulls.

use super::{db_error, internal_error, not_found, ApiError};
use crate::control_plane::spec::{compute_etag, to_pipeline_spec, EtagRow, SpecReadError};
use crate::control_plane::ControlPlaneState;
use crate::types::{
    AgentRegisterRequest, Assignment, AssignmentsResponse, HeartbeatRequest,
};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Derived liveness: ONLINE iff the agent was seen within the threshold.
fn live_status(last_seen_at: DateTime<Utc>, threshold_seconds: i64) -> &'static str {
    if (Utc::now() - last_seen_at).num_seconds() <= threshold_seconds {
        "ONLINE"
    } else {
        "OFFLINE"
    }
}

fn capabilities_json(capabilities: &[String]) -> String {
    serde_json::to_string(capabilities).unwrap_or_else(|_| "[]".to_string())
}

/// POST /v1/agents/register
pub async fn register(
    State(state): State<Arc<ControlPlaneState>>,
    Json(req): Json<AgentRegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO agents (id, region, tenant_id, admin_port, capabilities, created_at, last_seen_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           region = excluded.region,
           tenant_id = excluded.tenant_id,
           admin_port = excluded.admin_port,
           capabilities = excluded.capabilities,
           last_seen_at = excluded.last_seen_at",
    )
    .bind(&req.agent_id)
    .bind(&req.region)
    .bind(&req.tenant_id)
    .bind(req.admin_port.map(i64::from))
    .bind(capabilities_json(&req.capabilities))
    .bind(now)
    .bind(now)
    .execute(&state.db)
    .await
    .map_err(db_error)?;

    info!(agent_id = %req.agent_id, region = %req.region, "agent registered");
    Ok(Json(serde_json::json!({"ok": true})))
}

/// POST /v1/agents/{agent_id}/heartbeat
pub async fn heartbeat(
    State(state): State<Arc<ControlPlaneState>>,
    Path(agent_id): Path<String>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<Value>, ApiError> {
    let result = sqlx::query(
        "UPDATE agents SET region = ?, admin_port = ?, capabilities = ?, last_seen_at = ?
         WHERE id = ?",
    )
    .bind(&req.region)
    .bind(req.admin_port.map(i64::from))
    .bind(capabilities_json(&req.capabilities))
    .bind(Utc::now())
    .bind(&agent_id)
    .execute(&state.db)
    .await
    .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(not_found("agent_not_found"));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

/// Agent listing entry with derived status.
#[derive(Debug, Serialize)]
pub struct AgentInfo {
    pub agent_id: String,
    pub region: String,
    pub tenant_id: Option<String>,
    pub admin_port: Option<i64>,
    pub capabilities: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: &'static str,
}

/// GET /v1/agents
pub async fn list_agents(
    State(state): State<Arc<ControlPlaneState>>,
) -> Result<Json<Value>, ApiError> {
    let rows: Vec<(
        String,
        String,
        Option<String>,
        Option<i64>,
        String,
        DateTime<Utc>,
        DateTime<Utc>,
    )> = sqlx::query_as(
        "SELECT id, region, tenant_id, admin_port, capabilities, created_at, last_seen_at
         FROM agents ORDER BY created_at ASC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    let threshold = state.config.agent_offline_threshold_seconds;
    let agents: Vec<AgentInfo> = rows
        .into_iter()
        .map(
            |(agent_id, region, tenant_id, admin_port, capabilities, created_at, last_seen_at)| {
                AgentInfo {
                    agent_id,
                    region,
                    tenant_id,
                    admin_port,
                    capabilities: serde_json::from_str(&capabilities).unwrap_or_default(),
                    created_at,
                    last_seen_at,
                    status: live_status(last_seen_at, threshold),
                }
            },
        )
        .collect();

    Ok(Json(serde_json::json!({ "agents": agents })))
}

#[derive(Debug, Deserialize)]
pub struct AssignmentsQuery {
    pub region: String,
}

/// GET /v1/agents/{agent_id}/assignments?region=...
///
/// The central contract with agents. Touches `last_seen_at` as a side
/// effect, then serves the ordered assignment set plus its ETag (body
/// field and `ETag` header). The ETag basis excludes the touch, so
/// repeated pulls with no changes return the same tag.
pub async fn get_assignments(
    State(state): State<Arc<ControlPlaneState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<AssignmentsQuery>,
) -> Result<([(header::HeaderName, String); 1], Json<AssignmentsResponse>), ApiError> {
    let mut tx = state.db.begin().await.map_err(db_error)?;

    let touched = sqlx::query("UPDATE agents SET last_seen_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(&agent_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    if touched.rows_affected() == 0 {
        return Err(not_found("agent_not_found"));
    }

    let rows: Vec<(String, String, String, bool, i64, String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT a.id, p.id, p.name, p.enabled, p.version, p.spec, p.updated_at
         FROM assignments a
         JOIN pipelines p ON p.id = a.pipeline_id
         WHERE a.agent_id = ? AND a.region = ?
         ORDER BY a.created_at ASC",
    )
    .bind(&agent_id)
    .bind(&query.region)
    .fetch_all(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    let mut assignments = Vec::with_capacity(rows.len());
    let mut basis = Vec::with_capacity(rows.len());

    for (assignment_id, pipeline_id, name, enabled, version, stored_spec, updated_at) in rows {
        let pipeline = to_pipeline_spec(&pipeline_id, &name, enabled, &stored_spec)
            .map_err(|e: SpecReadError| internal_error(e))?;

        basis.push(EtagRow::new(&assignment_id, &pipeline_id, version, updated_at));
        assignments.push(Assignment {
            assignment_id,
            agent_id: agent_id.clone(),
            region: query.region.clone(),
            pipeline,
            revision: version,
            updated_at,
        });
    }

    let etag = compute_etag(&basis);
    let body = AssignmentsResponse {
        agent_id: Some(agent_id),
        region: Some(query.region),
        etag: etag.clone(),
        assignments,
    };

    Ok(([(header::ETAG, etag)], Json(body)))
}
