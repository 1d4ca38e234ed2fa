//! Control-plane API route registration and shared response types.

pub mod agents;
pub mod assignments;
pub mod health;
pub mod pipelines;

use crate::control_plane::ControlPlaneState;
use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Error body: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn not_found(detail: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: detail.to_string(),
        }),
    )
}

pub(crate) fn internal_error(detail: impl ToString) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: detail.to_string(),
        }),
    )
}

pub(crate) fn db_error(e: sqlx::Error) -> ApiError {
    internal_error(format!("database error: {e}"))
}

/// Build the complete control-plane router.
pub fn build_router(state: Arc<ControlPlaneState>) -> Router {
    let cors = if state.config.allow_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .config
            .allow_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .route("/healthz", axum::routing::get(health::healthz))
        // Agents
        .route("/v1/agents/register", axum::routing::post(agents::register))
        .route(
            "/v1/agents/{agent_id}/heartbeat",
            axum::routing::post(agents::heartbeat),
        )
        .route("/v1/agents", axum::routing::get(agents::list_agents))
        .route(
            "/v1/agents/{agent_id}/assignments",
            axum::routing::get(agents::get_assignments),
        )
        // Pipelines
        .route("/v1/pipelines", axum::routing::post(pipelines::create_pipeline))
        .route("/v1/pipelines", axum::routing::get(pipelines::list_pipelines))
        .route(
            "/v1/pipelines/{pipeline_id}",
            axum::routing::put(pipelines::update_pipeline),
        )
        // Assignments
        .route(
            "/v1/assignments",
            axum::routing::post(assignments::create_assignment),
        )
        .route(
            "/v1/assignments/{assignment_id}",
            axum::routing::delete(assignments::delete_assignment),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
