//! Optional agent admin API: health and per-pipeline stats.
//!
//! Served only when `admin_port` is configured. Read-only; it takes the
//! runner map lock just long enough to snapshot counters.

use super::SharedRunners;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

async fn healthz() -> Json<Value> {
    Json(serde_json::json!({"ok": true}))
}

async fn list_pipelines(State(runners): State<SharedRunners>) -> Json<Value> {
    let snapshot: Vec<crate::pipeline::RunnerStats> = {
        let map = runners.lock().await;
        map.values().map(crate::pipeline::PipelineRunner::stats).collect()
    };
    Json(serde_json::json!({ "pipelines": snapshot }))
}

/// Serve the admin API until cancellation.
pub async fn serve(
    port: u16,
    runners: SharedRunners,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/pipelines", get(list_pipelines))
        .with_state(runners);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "agent admin API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
