//! Agent runtime: register, heartbeat, pull assignments, reconcile, tick.
//!
//! One control task owns the whole loop. Every ~50 ms it fires whichever
//! phases are due (heartbeat every 5 s, assignment pull every
//! `poll_assignments_seconds`), then ticks each running pipeline once.
//! Control-plane failures are logged and retried on the next cycle; a 404
//! means the control plane forgot us and triggers re-registration.

mod admin;
mod client;
mod state;

pub use client::{ClientError, ControlPlaneClient};
pub use state::AgentState;

use crate::config::AgentConfig;
use crate::pipeline::{PipelineRunner, RunnerContext};
use crate::retry::RetryPolicy;
use crate::types::{AgentRegisterRequest, Assignment, AssignmentsResponse, HeartbeatRequest};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runner map shared between the control loop and the admin API.
pub type SharedRunners = Arc<Mutex<HashMap<String, PipelineRunner>>>;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const TICK_INTERVAL: Duration = Duration::from_millis(50);
/// At least one full backoff cap, so an inflight batch gets a final try.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(12);

/// Agent process state: one per `observix-agent`.
pub struct Agent {
    agent_id: String,
    region: String,
    tenant_id: Option<String>,
    admin_port: Option<u16>,
    poll_interval: Duration,
    client: ControlPlaneClient,
    state: AgentState,
    retry: RetryPolicy,
    token: String,
    runners: SharedRunners,
    last_applied_etag: Option<String>,
}

impl Agent {
    pub fn new(config: &AgentConfig) -> anyhow::Result<Self> {
        let state = AgentState::open(&config.state_dir)?;
        let token = match state.load_token() {
            Some(token) => token,
            None => {
                let token = uuid::Uuid::new_v4().to_string();
                state.save_token(&token)?;
                token
            }
        };

        let client = ControlPlaneClient::new(&config.control_plane_url, HTTP_TIMEOUT)?;

        Ok(Self {
            agent_id: config.agent_id.clone(),
            region: config.region.clone(),
            tenant_id: config.tenant_id.clone(),
            admin_port: config.admin_port,
            poll_interval: Duration::from_secs(config.poll_assignments_seconds.max(1)),
            client,
            state,
            retry: RetryPolicy::default(),
            token,
            runners: Arc::new(Mutex::new(HashMap::new())),
            last_applied_etag: None,
        })
    }

    fn capabilities() -> Vec<String> {
        [
            "file_tail",
            "syslog_udp",
            "http_listener",
            "http",
            "file",
            "syslog_udp_dest",
        ]
        .iter()
        .map(ToString::to_string)
        .collect()
    }

    fn register_request(&self) -> AgentRegisterRequest {
        AgentRegisterRequest {
            agent_id: self.agent_id.clone(),
            region: self.region.clone(),
            tenant_id: self.tenant_id.clone(),
            admin_port: self.admin_port,
            capabilities: Self::capabilities(),
            token: Some(self.token.clone()),
        }
    }

    fn heartbeat_request(&self) -> HeartbeatRequest {
        HeartbeatRequest {
            region: self.region.clone(),
            admin_port: self.admin_port,
            capabilities: Self::capabilities(),
        }
    }

    fn runner_context(&self) -> RunnerContext {
        RunnerContext {
            agent_id: self.agent_id.clone(),
            region: self.region.clone(),
            tenant_id: self.tenant_id.clone(),
        }
    }

    /// Initial registration with bounded retries. Once the loop is
    /// running, registration failures fall back to next-cycle retries so
    /// ticks are never delayed by a backoff sleep.
    async fn register_with_retry(&self) -> Result<(), ClientError> {
        let req = self.register_request();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.client.register(&req).await {
                Ok(()) => {
                    info!(agent_id = %self.agent_id, region = %self.region, "registered");
                    return Ok(());
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!(error = %e, attempt, "register failed, retrying");
                    self.retry.sleep(attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Bring the runner map into agreement with a pulled assignment set.
    ///
    /// Fast-path on an unchanged ETag. Otherwise: stop runners whose
    /// pipeline is gone or disabled, start runners for new pipelines, and
    /// restart runners whose revision changed (sources hold sockets, so a
    /// spec change always means stop + fresh start).
    pub async fn reconcile(&mut self, resp: AssignmentsResponse) {
        if self.last_applied_etag.as_deref() == Some(resp.etag.as_str()) {
            return;
        }

        let desired: HashMap<String, &Assignment> = resp
            .assignments
            .iter()
            .filter(|a| a.pipeline.enabled)
            .map(|a| (a.pipeline.pipeline_id.clone(), a))
            .collect();

        let ctx = self.runner_context();
        let mut runners = self.runners.lock().await;

        let stale: Vec<String> = runners
            .keys()
            .filter(|id| !desired.contains_key(*id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(mut runner) = runners.remove(&id) {
                runner.stop();
                info!(pipeline_id = %id, "pipeline stopped");
            }
        }

        for (id, assignment) in &desired {
            if let Some(existing) = runners.get(id) {
                if existing.revision == assignment.revision {
                    continue;
                }
                // Spec changed: replace, never mutate in place.
                if let Some(mut old) = runners.remove(id) {
                    old.stop();
                }
                info!(pipeline_id = %id, revision = assignment.revision, "pipeline spec changed, restarting");
            }

            match PipelineRunner::build(&ctx, &assignment.pipeline, assignment.revision).await {
                Ok(runner) => {
                    info!(
                        pipeline_id = %id,
                        name = %assignment.pipeline.name,
                        revision = assignment.revision,
                        "pipeline started"
                    );
                    runners.insert(id.clone(), runner);
                }
                Err(e) => {
                    warn!(pipeline_id = %id, error = %e, "failed to start pipeline");
                }
            }
        }

        let count = runners.len();
        drop(runners);

        self.last_applied_etag = Some(resp.etag);
        info!(agent_id = %self.agent_id, pipelines = count, "assignments applied");
    }

    /// Tick every running pipeline exactly once.
    ///
    /// The id list is snapshotted under the lock first so a concurrent
    /// admin read (or future reconcile off-thread) never invalidates the
    /// iteration.
    async fn tick_all(&self) {
        let ids: Vec<String> = {
            let runners = self.runners.lock().await;
            runners.keys().cloned().collect()
        };

        for id in ids {
            let mut runners = self.runners.lock().await;
            if let Some(runner) = runners.get_mut(&id) {
                if let Err(e) = runner.tick().await {
                    warn!(pipeline_id = %id, error = %e, "pipeline tick failed");
                }
            }
        }
    }

    /// Run until cancelled: the register / heartbeat / pull / tick loop.
    pub async fn run(mut self, cancel: CancellationToken) -> anyhow::Result<()> {
        self.register_with_retry().await?;

        // Offsets are loaded for forward compatibility with tail resume;
        // an empty map is persisted so the state dir is fully initialized.
        let offsets = self.state.load_offsets();
        if offsets.is_empty() {
            if let Err(e) = self.state.save_offsets(&offsets) {
                warn!(error = %e, "failed to initialize offsets file");
            }
        }

        if let Some(port) = self.admin_port {
            let runners = Arc::clone(&self.runners);
            let admin_cancel = cancel.clone();
            tokio::spawn(async move {
                if let Err(e) = admin::serve(port, runners, admin_cancel).await {
                    warn!(error = %e, "agent admin API stopped");
                }
            });
        }

        let mut last_heartbeat = Instant::now();
        // Backdate the pull clock so the first cycle pulls immediately.
        let mut last_pull = Instant::now()
            .checked_sub(self.poll_interval)
            .unwrap_or_else(Instant::now);
        let mut needs_register = false;

        info!(
            agent_id = %self.agent_id,
            region = %self.region,
            control_plane = %self.client.base_url(),
            "agent loop running"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let now = Instant::now();

            if now.duration_since(last_heartbeat) >= HEARTBEAT_INTERVAL {
                match self
                    .client
                    .heartbeat(&self.agent_id, &self.heartbeat_request())
                    .await
                {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        warn!("control plane lost this agent, re-registering on next pull");
                        needs_register = true;
                    }
                    Err(e) => warn!(error = %e, "heartbeat failed"),
                }
                last_heartbeat = now;
            }

            if now.duration_since(last_pull) >= self.poll_interval {
                if needs_register {
                    match self.client.register(&self.register_request()).await {
                        Ok(()) => {
                            info!(agent_id = %self.agent_id, "re-registered");
                            needs_register = false;
                        }
                        Err(e) => warn!(error = %e, "re-register failed"),
                    }
                }

                match self.client.pull_assignments(&self.agent_id, &self.region).await {
                    Ok(resp) => self.reconcile(resp).await,
                    Err(e) if e.is_not_found() => {
                        warn!("assignments pull returned 404, re-registering");
                        match self.client.register(&self.register_request()).await {
                            Ok(()) => info!(agent_id = %self.agent_id, "re-registered"),
                            Err(e) => warn!(error = %e, "re-register failed"),
                        }
                    }
                    Err(e) => warn!(error = %e, "assignments pull failed"),
                }
                last_pull = now;
            }

            self.tick_all().await;

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(TICK_INTERVAL) => {}
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Cooperative shutdown: drain inflight batches within a bounded
    /// grace, then close sources.
    async fn shutdown(&mut self) {
        info!(agent_id = %self.agent_id, "agent shutting down");
        let deadline = Instant::now() + SHUTDOWN_GRACE;

        let mut runners = self.runners.lock().await;
        for (id, runner) in runners.iter_mut() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            runner.drain(remaining).await;
            info!(pipeline_id = %id, "pipeline drained");
        }
        runners.clear();
        drop(runners);

        if let Err(e) = self.state.save_offsets(&self.state.load_offsets()) {
            warn!(error = %e, "failed to persist offsets on shutdown");
        }
        info!(agent_id = %self.agent_id, "agent stopped");
    }
}
