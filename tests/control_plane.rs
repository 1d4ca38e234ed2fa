//! Control-plane integration tests.
//!
//! Each test boots the full axum app over a fresh temp SQLite database
//! and drives it with a real HTTP client.

use observix::control_plane::config::ControlPlaneConfig;
use observix::control_plane::{api, db, ControlPlaneState};
use observix::types::AssignmentsResponse;
use serde_json::{json, Value};

struct TestServer {
    base: String,
    client: reqwest::Client,
    _tmp: tempfile::TempDir,
}

async fn spawn_control_plane() -> TestServer {
    let tmp = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", tmp.path().join("cp.db").display());

    let pool = db::create_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let state = ControlPlaneState::new(pool, ControlPlaneConfig::default());
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        base: format!("http://{addr}"),
        client: reqwest::Client::new(),
        _tmp: tmp,
    }
}

impl TestServer {
    async fn register_agent(&self, agent_id: &str, region: &str) {
        let resp = self
            .client
            .post(format!("{}/v1/agents/register", self.base))
            .json(&json!({
                "agent_id": agent_id,
                "region": region,
                "capabilities": ["file_tail", "file"],
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    async fn create_pipeline(&self, name: &str, enabled: bool, spec: Value) -> String {
        let body: Value = self
            .client
            .post(format!("{}/v1/pipelines", self.base))
            .json(&json!({"name": name, "enabled": enabled, "spec": spec}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["pipeline_id"].as_str().unwrap().to_string()
    }

    async fn create_assignment(&self, agent_id: &str, region: &str, pipeline_id: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/assignments", self.base))
            .json(&json!({
                "agent_id": agent_id,
                "region": region,
                "pipeline_id": pipeline_id,
            }))
            .send()
            .await
            .unwrap()
    }

    async fn pull(&self, agent_id: &str, region: &str) -> (AssignmentsResponse, String) {
        let resp = self
            .client
            .get(format!("{}/v1/agents/{agent_id}/assignments", self.base))
            .query(&[("region", region)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let header = resp
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        (resp.json().await.unwrap(), header)
    }
}

fn demo_spec() -> Value {
    json!({
        "source": {"type": "syslog_udp", "options": {"port": 5514}},
        "destination": {"type": "file", "options": {"path": "/tmp/out.log", "format": "raw"}},
        "batch_max_events": 2,
        "batch_max_seconds": 10,
    })
}

#[tokio::test]
async fn test_healthz() {
    let server = spawn_control_plane().await;
    let body: Value = server
        .client
        .get(format!("{}/healthz", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_register_then_empty_pull_has_stable_etag() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;

    let (first, header) = server.pull("a1", "eu").await;
    assert!(first.assignments.is_empty());
    assert!(!first.etag.is_empty());
    assert_eq!(header, first.etag, "ETag header must match body etag");

    // A no-op repeat pull returns the identical tag even though it
    // touches last_seen_at.
    let (second, _) = server.pull("a1", "eu").await;
    assert_eq!(second.etag, first.etag);
}

#[tokio::test]
async fn test_pull_unknown_agent_is_404() {
    let server = spawn_control_plane().await;
    let resp = server
        .client
        .get(format!("{}/v1/agents/ghost/assignments", server.base))
        .query(&[("region", "eu")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "agent_not_found");
}

#[tokio::test]
async fn test_heartbeat_requires_registration() {
    let server = spawn_control_plane().await;

    let heartbeat = json!({"region": "eu", "capabilities": []});
    let resp = server
        .client
        .post(format!("{}/v1/agents/a1/heartbeat", server.base))
        .json(&heartbeat)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    server.register_agent("a1", "eu").await;
    let resp = server
        .client
        .post(format!("{}/v1/agents/a1/heartbeat", server.base))
        .json(&heartbeat)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn test_registered_agent_lists_online() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;

    let body: Value = server
        .client
        .get(format!("{}/v1/agents", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let agents = body["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["agent_id"], "a1");
    assert_eq!(agents[0]["status"], "ONLINE");
    assert_eq!(agents[0]["capabilities"][0], "file_tail");
}

#[tokio::test]
async fn test_assignment_changes_etag_and_serves_spec() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;
    let (empty, _) = server.pull("a1", "eu").await;

    let pipeline_id = server.create_pipeline("p1", true, demo_spec()).await;
    let resp = server.create_assignment("a1", "eu", &pipeline_id).await;
    assert_eq!(resp.status().as_u16(), 200);

    let (pulled, _) = server.pull("a1", "eu").await;
    assert_ne!(pulled.etag, empty.etag);
    assert_eq!(pulled.assignments.len(), 1);

    let assignment = &pulled.assignments[0];
    assert_eq!(assignment.revision, 1);
    assert_eq!(assignment.pipeline.pipeline_id, pipeline_id);
    assert_eq!(assignment.pipeline.name, "p1");
    assert!(assignment.pipeline.enabled);
    assert_eq!(assignment.pipeline.source.kind, "syslog_udp");
    assert_eq!(assignment.pipeline.destination.kind, "file");
    assert_eq!(assignment.pipeline.processor.mode, "raw");
    assert_eq!(assignment.pipeline.batch_max_events, 2);
}

#[tokio::test]
async fn test_update_bumps_revision_and_etag() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;
    let pipeline_id = server.create_pipeline("p1", true, demo_spec()).await;
    server.create_assignment("a1", "eu", &pipeline_id).await;
    let (before, _) = server.pull("a1", "eu").await;

    // Identical body: still a new version and a new etag.
    let resp = server
        .client
        .put(format!("{}/v1/pipelines/{pipeline_id}", server.base))
        .json(&json!({"name": "p1", "enabled": true, "spec": demo_spec()}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let (after, _) = server.pull("a1", "eu").await;
    assert_eq!(after.assignments[0].revision, 2);
    assert_ne!(after.etag, before.etag);
}

#[tokio::test]
async fn test_update_missing_pipeline_is_404() {
    let server = spawn_control_plane().await;
    let resp = server
        .client
        .put(format!("{}/v1/pipelines/missing", server.base))
        .json(&json!({"name": "x", "enabled": true, "spec": demo_spec()}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn test_disabled_pipeline_still_served() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;
    let pipeline_id = server.create_pipeline("p1", true, demo_spec()).await;
    server.create_assignment("a1", "eu", &pipeline_id).await;

    server
        .client
        .put(format!("{}/v1/pipelines/{pipeline_id}", server.base))
        .json(&json!({"name": "p1", "enabled": false, "spec": demo_spec()}))
        .send()
        .await
        .unwrap();

    // The server keeps serving the assignment; filtering disabled
    // pipelines is the agent reconciler's job.
    let (pulled, _) = server.pull("a1", "eu").await;
    assert_eq!(pulled.assignments.len(), 1);
    assert!(!pulled.assignments[0].pipeline.enabled);
}

#[tokio::test]
async fn test_assignment_create_is_idempotent() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;
    let pipeline_id = server.create_pipeline("p1", true, demo_spec()).await;

    let first: Value = server
        .create_assignment("a1", "eu", &pipeline_id)
        .await
        .json()
        .await
        .unwrap();
    let second: Value = server
        .create_assignment("a1", "eu", &pipeline_id)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(first["assignment_id"], second["assignment_id"]);

    let (pulled, _) = server.pull("a1", "eu").await;
    assert_eq!(pulled.assignments.len(), 1);
}

#[tokio::test]
async fn test_assignment_requires_agent_and_pipeline() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;
    let pipeline_id = server.create_pipeline("p1", true, demo_spec()).await;

    let resp = server.create_assignment("ghost", "eu", &pipeline_id).await;
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "agent_not_found");

    let resp = server.create_assignment("a1", "eu", "missing-pipeline").await;
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "pipeline_not_found");
}

#[tokio::test]
async fn test_delete_assignment_restores_empty_etag() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;
    let (empty, _) = server.pull("a1", "eu").await;

    let pipeline_id = server.create_pipeline("p1", true, demo_spec()).await;
    let created: Value = server
        .create_assignment("a1", "eu", &pipeline_id)
        .await
        .json()
        .await
        .unwrap();
    let assignment_id = created["assignment_id"].as_str().unwrap();

    let resp = server
        .client
        .delete(format!("{}/v1/assignments/{assignment_id}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let (after, _) = server.pull("a1", "eu").await;
    assert!(after.assignments.is_empty());
    assert_eq!(after.etag, empty.etag, "empty set must hash to the same etag");

    // Deleting again is a 404.
    let resp = server
        .client
        .delete(format!("{}/v1/assignments/{assignment_id}", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn test_wrapped_specs_normalize_on_write() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;

    for wrapped in [json!({"spec": demo_spec()}), json!({"spec": {"spec": demo_spec()}})] {
        let pipeline_id = server.create_pipeline("wrapped", true, wrapped).await;
        server.create_assignment("a1", "eu", &pipeline_id).await;
    }

    let (pulled, _) = server.pull("a1", "eu").await;
    assert_eq!(pulled.assignments.len(), 2);
    for assignment in &pulled.assignments {
        assert_eq!(assignment.pipeline.source.kind, "syslog_udp");
    }
}

#[tokio::test]
async fn test_metadata_keys_stripped_from_stored_spec() {
    let server = spawn_control_plane().await;

    let mut spec = demo_spec();
    let obj = spec.as_object_mut().unwrap();
    obj.insert("pipeline_id".to_string(), json!("spoofed"));
    obj.insert("name".to_string(), json!("spoofed"));
    obj.insert("enabled".to_string(), json!(false));
    obj.insert("version".to_string(), json!(99));

    server.create_pipeline("clean", true, spec).await;

    let body: Value = server
        .client
        .get(format!("{}/v1/pipelines", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let stored = &body["pipelines"][0];
    assert_eq!(stored["name"], "clean");
    assert_eq!(stored["version"], 1);
    let blob = stored["spec"].as_object().unwrap();
    for key in ["pipeline_id", "name", "enabled", "version"] {
        assert!(!blob.contains_key(key), "{key} leaked into stored spec");
    }
    assert!(blob.contains_key("source"));
}

#[tokio::test]
async fn test_assignments_are_region_scoped() {
    let server = spawn_control_plane().await;
    server.register_agent("a1", "eu").await;
    let pipeline_id = server.create_pipeline("p1", true, demo_spec()).await;
    server.create_assignment("a1", "eu", &pipeline_id).await;

    let (other_region, _) = server.pull("a1", "us").await;
    assert!(other_region.assignments.is_empty());

    let (same_region, _) = server.pull("a1", "eu").await;
    assert_eq!(same_region.assignments.len(), 1);
}
