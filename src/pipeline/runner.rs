//! Per-pipeline execution: poll, batch, process, send with backoff.

use super::spec::{DestinationSpec, ProcessorSpec, SourceSpec};
use super::PipelineError;
use crate::destinations::{
    Destination, FileDestination, HttpDestination, SyslogUdpDestination,
};
use crate::events::Event;
use crate::processors::{IndexedProcessor, Processor, RawProcessor};
use crate::retry::SendBackoff;
use crate::sources::{FileTailSource, HttpListenerSource, Source, SyslogUdpSource};
use crate::types::PipelineSpec;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const METRICS_INTERVAL: Duration = Duration::from_secs(5);

/// Agent-scoped metadata stamped onto every processed event.
#[derive(Debug, Clone)]
pub struct RunnerContext {
    pub agent_id: String,
    pub region: String,
    pub tenant_id: Option<String>,
}

impl RunnerContext {
    fn to_meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert("agent_id".to_string(), Value::from(self.agent_id.clone()));
        meta.insert("region".to_string(), Value::from(self.region.clone()));
        if let Some(tenant) = &self.tenant_id {
            meta.insert("tenant_id".to_string(), Value::from(tenant.clone()));
        }
        meta
    }
}

/// Point-in-time runner statistics, served by the agent admin API and
/// logged periodically.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerStats {
    pub pipeline_id: String,
    pub name: String,
    pub revision: i64,
    pub received: u64,
    pub sent_events: u64,
    pub sent_batches: u64,
    pub send_failures: u64,
    pub buffer: usize,
    pub inflight: usize,
    pub retry_attempt: u32,
    pub next_send_in_seconds: f64,
    pub source_dropped: u64,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_err: Option<String>,
}

/// Runs one pipeline assignment using a non-blocking tick loop.
///
/// A cut batch becomes `inflight` and stays there until the destination
/// acknowledges it; send failures reschedule the batch with exponential
/// backoff and are never dropped. Stopping the pipeline (reconcile) is
/// the only way to abandon an inflight batch.
pub struct PipelineRunner {
    pub pipeline_id: String,
    pub name: String,
    pub revision: i64,
    enabled: bool,
    batch_max_events: usize,
    batch_max_seconds: Duration,
    source: Box<dyn Source>,
    processor: Box<dyn Processor>,
    destination: Box<dyn Destination>,
    agent_meta: Map<String, Value>,
    backoff: SendBackoff,

    buffer: Vec<Event>,
    last_flush: Instant,
    inflight: Vec<Event>,
    /// False while `inflight` still holds the raw batch; processing reruns
    /// on the next attempt after a processor failure.
    inflight_processed: bool,
    send_attempt: u32,
    next_send_at: Instant,

    received: u64,
    sent_events: u64,
    sent_batches: u64,
    send_failures: u64,
    last_ok_at: Option<DateTime<Utc>>,
    last_err: Option<String>,
    last_metrics_log: Instant,
}

impl PipelineRunner {
    /// Build a runner from an assignment's pipeline spec.
    ///
    /// Parses the spec into typed variants and constructs the source,
    /// processor, and destination. Sources that listen (syslog UDP, HTTP)
    /// bind here; a bind failure fails the build and leaves reconcile to
    /// retry on the next pull.
    pub async fn build(
        ctx: &RunnerContext,
        spec: &PipelineSpec,
        revision: i64,
    ) -> Result<Self, PipelineError> {
        let source: Box<dyn Source> = match SourceSpec::parse(&spec.source)? {
            SourceSpec::FileTail(opts) => Box::new(FileTailSource::new(
                &opts.path,
                opts.from_start,
                opts.start_position.as_deref(),
            )),
            SourceSpec::SyslogUdp(opts) => Box::new(
                SyslogUdpSource::bind(&opts.host, opts.port, opts.max_queue_size).await?,
            ),
            SourceSpec::HttpListener(opts) => Box::new(
                HttpListenerSource::bind(&opts.host, opts.port, &opts.path, opts.max_queue_size)
                    .await?,
            ),
        };

        let destination: Box<dyn Destination> = match DestinationSpec::parse(&spec.destination)? {
            DestinationSpec::File(opts) => Box::new(FileDestination::new(&opts.path, &opts.format)?),
            DestinationSpec::Http(opts) => {
                Box::new(HttpDestination::new(&opts.url, opts.timeout_seconds)?)
            }
            DestinationSpec::SyslogUdp(opts) => Box::new(SyslogUdpDestination::new(
                &opts.host,
                opts.port,
                opts.pri,
                opts.hostname.clone(),
                &opts.appname,
            )?),
        };

        let processor: Box<dyn Processor> = match ProcessorSpec::parse(&spec.processor)? {
            ProcessorSpec::Raw => Box::new(RawProcessor),
            ProcessorSpec::Indexed(opts) => Box::new(IndexedProcessor::new(opts)?),
        };

        Ok(Self::from_parts(ctx, spec, revision, source, processor, destination))
    }

    fn from_parts(
        ctx: &RunnerContext,
        spec: &PipelineSpec,
        revision: i64,
        source: Box<dyn Source>,
        processor: Box<dyn Processor>,
        destination: Box<dyn Destination>,
    ) -> Self {
        let now = Instant::now();
        Self {
            pipeline_id: spec.pipeline_id.clone(),
            name: spec.name.clone(),
            revision,
            enabled: spec.enabled,
            batch_max_events: (spec.batch_max_events.max(1)) as usize,
            batch_max_seconds: Duration::from_secs_f64(spec.batch_max_seconds.max(0.1)),
            source,
            processor,
            destination,
            agent_meta: ctx.to_meta(),
            backoff: SendBackoff::default(),
            buffer: Vec::new(),
            last_flush: now,
            inflight: Vec::new(),
            inflight_processed: false,
            send_attempt: 0,
            next_send_at: now,
            received: 0,
            sent_events: 0,
            sent_batches: 0,
            send_failures: 0,
            last_ok_at: None,
            last_err: None,
            last_metrics_log: now,
        }
    }

    /// Advance pipeline execution by one scheduling slice.
    ///
    /// Never blocks beyond one destination send (bounded by its own
    /// timeout). Errors from the source are returned so the agent can log
    /// them; the runner itself stays usable.
    pub async fn tick(&mut self) -> Result<(), PipelineError> {
        if !self.enabled {
            return Ok(());
        }

        let now = Instant::now();

        if !self.inflight.is_empty() && now < self.next_send_at {
            self.maybe_log_metrics(now);
            return Ok(());
        }

        if !self.inflight.is_empty() {
            self.try_send_inflight().await;
            self.maybe_log_metrics(Instant::now());
            return Ok(());
        }

        let pulled = match self.source.poll(self.batch_max_events).await {
            Ok(events) => events,
            Err(e) => {
                self.last_err = Some(format!("{}: {e}", e.kind()));
                self.maybe_log_metrics(now);
                return Err(PipelineError::Source(e));
            }
        };
        if !pulled.is_empty() {
            self.received += pulled.len() as u64;
            self.buffer.extend(pulled);
        }

        self.flush_if_needed().await;
        self.maybe_log_metrics(Instant::now());
        Ok(())
    }

    async fn flush_if_needed(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let age = self.last_flush.elapsed();
        if self.buffer.len() < self.batch_max_events && age < self.batch_max_seconds {
            return;
        }

        self.inflight = std::mem::take(&mut self.buffer);
        self.inflight_processed = false;
        self.last_flush = Instant::now();
        self.send_attempt = 0;
        self.next_send_at = Instant::now();
        self.try_send_inflight().await;
    }

    async fn try_send_inflight(&mut self) {
        if self.inflight.is_empty() {
            return;
        }

        if !self.inflight_processed {
            match self.processor.process(&self.inflight).await {
                Ok(mut processed) => {
                    for event in &mut processed {
                        for (k, v) in &self.agent_meta {
                            event.meta.insert(k.clone(), v.clone());
                        }
                        event
                            .meta
                            .insert("pipeline".to_string(), Value::from(self.name.clone()));
                        event.meta.insert(
                            "pipeline_id".to_string(),
                            Value::from(self.pipeline_id.clone()),
                        );
                    }
                    self.inflight = processed;
                    self.inflight_processed = true;
                }
                Err(e) => {
                    // The raw batch stays inflight; same failure path as a
                    // destination error so the operator sees it in metrics.
                    self.record_send_failure(format!("{}: {e}", e.kind()));
                    return;
                }
            }
        }

        match self.destination.send(&self.inflight).await {
            Ok(()) => {
                self.sent_batches += 1;
                self.sent_events += self.inflight.len() as u64;
                self.inflight.clear();
                self.inflight_processed = false;
                self.send_attempt = 0;
                self.next_send_at = Instant::now();
                self.last_ok_at = Some(Utc::now());
                self.last_err = None;
            }
            Err(e) => {
                self.record_send_failure(format!("{}: {e}", e.kind()));
            }
        }
    }

    fn record_send_failure(&mut self, err: String) {
        self.send_failures += 1;
        self.send_attempt += 1;
        self.last_err = Some(err);
        self.next_send_at = Instant::now() + self.backoff.delay(self.send_attempt);
    }

    fn maybe_log_metrics(&mut self, now: Instant) {
        if now.duration_since(self.last_metrics_log) < METRICS_INTERVAL {
            return;
        }
        self.last_metrics_log = now;

        let next_send_in = if self.inflight.is_empty() {
            0.0
        } else {
            self.next_send_at.saturating_duration_since(now).as_secs_f64()
        };
        let last_ok_age = self
            .last_ok_at
            .map(|t| (Utc::now() - t).num_milliseconds() as f64 / 1000.0);

        info!(
            pipeline_id = %self.pipeline_id,
            name = %self.name,
            recv = self.received,
            sent_events = self.sent_events,
            sent_batches = self.sent_batches,
            failures = self.send_failures,
            buffer = self.buffer.len(),
            inflight = self.inflight.len(),
            retry_attempt = self.send_attempt,
            next_send_in = format_args!("{next_send_in:.2}s"),
            last_ok_age = ?last_ok_age,
            dropped = self.source.dropped(),
            last_err = self.last_err.as_deref().unwrap_or("none"),
            "pipeline_stats"
        );
    }

    /// Current counters and queue depths.
    pub fn stats(&self) -> RunnerStats {
        let now = Instant::now();
        RunnerStats {
            pipeline_id: self.pipeline_id.clone(),
            name: self.name.clone(),
            revision: self.revision,
            received: self.received,
            sent_events: self.sent_events,
            sent_batches: self.sent_batches,
            send_failures: self.send_failures,
            buffer: self.buffer.len(),
            inflight: self.inflight.len(),
            retry_attempt: self.send_attempt,
            next_send_in_seconds: if self.inflight.is_empty() {
                0.0
            } else {
                self.next_send_at.saturating_duration_since(now).as_secs_f64()
            },
            source_dropped: self.source.dropped(),
            last_ok_at: self.last_ok_at,
            last_err: self.last_err.clone(),
        }
    }

    /// Stop immediately: close the source and drop whatever is queued.
    /// Used when reconcile removes or replaces a pipeline.
    pub fn stop(&mut self) {
        self.source.close();
        if !self.inflight.is_empty() || !self.buffer.is_empty() {
            warn!(
                pipeline_id = %self.pipeline_id,
                buffered = self.buffer.len(),
                inflight = self.inflight.len(),
                "stopping pipeline with undelivered events"
            );
        }
    }

    /// Graceful drain for agent shutdown: flush the buffer and keep
    /// retrying the inflight batch until it sends or the grace expires,
    /// then close the source.
    pub async fn drain(&mut self, grace: Duration) {
        let deadline = Instant::now() + grace;

        if !self.buffer.is_empty() && self.inflight.is_empty() {
            self.inflight = std::mem::take(&mut self.buffer);
            self.inflight_processed = false;
            self.send_attempt = 0;
            self.next_send_at = Instant::now();
        }

        while !self.inflight.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                warn!(
                    pipeline_id = %self.pipeline_id,
                    inflight = self.inflight.len(),
                    "shutdown grace expired with undelivered events"
                );
                break;
            }
            if now < self.next_send_at {
                let wait = self
                    .next_send_at
                    .saturating_duration_since(now)
                    .min(deadline.saturating_duration_since(now))
                    .min(Duration::from_millis(50));
                tokio::time::sleep(wait).await;
                continue;
            }
            self.try_send_inflight().await;
        }

        self.source.close();
    }
}
