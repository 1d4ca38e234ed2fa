//! Shared wire types for the control-plane <-> agent contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registration payload sent by an agent on startup (and re-registration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegisterRequest {
    pub agent_id: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_port: Option<u16>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Carried for future auth wiring; the control plane does not check it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Heartbeat payload; requires the agent to already exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_port: Option<u16>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// Source section of a pipeline spec: `{"type": ..., "options": {...}}`.
///
/// Kept loose here (type tag + opaque options) so the control plane can
/// serve specs it does not execute; the agent parses options into typed
/// variants at reconcile time and fails fast on unknown types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Processor section: `{"mode": "raw"|"indexed", "options": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_processor_mode")]
    pub mode: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            mode: default_processor_mode(),
            options: Map::new(),
        }
    }
}

fn default_processor_mode() -> String {
    "raw".to_string()
}

/// Destination section: `{"type": ..., "options": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Pipeline spec as delivered to agents: control-plane metadata
/// (pipeline_id, name, enabled) re-joined with the stored spec blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub pipeline_id: String,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub source: SourceConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    pub destination: DestinationConfig,
    #[serde(default = "default_batch_max_events")]
    pub batch_max_events: u32,
    #[serde(default = "default_batch_max_seconds")]
    pub batch_max_seconds: f64,
}

fn default_enabled() -> bool {
    true
}

pub(crate) fn default_batch_max_events() -> u32 {
    200
}

pub(crate) fn default_batch_max_seconds() -> f64 {
    1.0
}

/// One pipeline bound to one (agent, region) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: String,
    pub agent_id: String,
    pub region: String,
    pub pipeline: PipelineSpec,
    /// The bound pipeline's version at serve time.
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

/// Response body for `GET /v1/agents/{agent_id}/assignments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentsResponse {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub etag: String,
    pub assignments: Vec<Assignment>,
}
