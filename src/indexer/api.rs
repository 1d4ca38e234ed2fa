//! Indexer HTTP surface: `/v1/normalize` and `/v1/health`.

use super::normalize;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

fn default_profile() -> String {
    "passthrough".to_string()
}

#[derive(Debug, Deserialize)]
pub struct NormalizeRequest {
    #[serde(default = "default_profile")]
    pub profile: String,
    pub raw: String,
    /// Accepted for contract compatibility; normalization does not read it.
    #[serde(default)]
    pub include_meta: Option<bool>,
}

async fn health() -> Json<Value> {
    Json(serde_json::json!({"ok": true}))
}

async fn normalize_handler(
    Json(req): Json<NormalizeRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match normalize(&req.profile, &req.raw) {
        Ok(doc) => Ok(Json(serde_json::json!({"ok": true, "doc": doc}))),
        Err(e) => Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        )),
    }
}

/// Build the indexer router.
pub fn build_router() -> Router {
    Router::new()
        .route("/v1/normalize", post(normalize_handler))
        .route("/v1/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, build_router()).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_normalize_endpoint() {
        let base = spawn().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/v1/normalize"))
            .json(&serde_json::json!({"profile": "kv_pairs", "raw": "a=1 b=2"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["ok"], true);
        assert_eq!(body["doc"]["a"], "1");
        assert_eq!(body["doc"]["b"], "2");
    }

    #[tokio::test]
    async fn test_unknown_profile_is_400() {
        let base = spawn().await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/v1/normalize"))
            .json(&serde_json::json!({"profile": "nope", "raw": "x"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn().await;
        let body: Value = reqwest::get(format!("{base}/v1/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
    }
}
