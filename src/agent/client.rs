//! HTTP client for agent -> control-plane communication.

use crate::types::{AgentRegisterRequest, AssignmentsResponse, HeartbeatRequest};
use std::time::Duration;

/// Control-plane client errors.
///
/// `NotFound` is load-bearing: on heartbeat or assignment pulls it means
/// the control plane no longer knows this agent, and the agent must
/// re-register.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server returned status {0}")]
    ServerStatus(reqwest::StatusCode),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Pooled HTTP client for one control plane.
#[derive(Clone)]
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
}

impl ControlPlaneClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::NotFound(body));
        }
        if !status.is_success() {
            return Err(ClientError::ServerStatus(status));
        }
        Ok(resp)
    }

    /// Upsert this agent on the control plane.
    pub async fn register(&self, req: &AgentRegisterRequest) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(format!("{}/v1/agents/register", self.base_url))
            .json(req)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Refresh `last_seen_at`; 404 means the agent must re-register.
    pub async fn heartbeat(
        &self,
        agent_id: &str,
        req: &HeartbeatRequest,
    ) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(format!("{}/v1/agents/{agent_id}/heartbeat", self.base_url))
            .json(req)
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Pull the current assignment set for this agent and region.
    pub async fn pull_assignments(
        &self,
        agent_id: &str,
        region: &str,
    ) -> Result<AssignmentsResponse, ClientError> {
        let resp = self
            .http
            .get(format!("{}/v1/agents/{agent_id}/assignments", self.base_url))
            .query(&[("region", region)])
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }
}
