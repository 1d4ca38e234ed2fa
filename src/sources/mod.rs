//! Event sources for pipelines.
//!
//! A source hands events to its pipeline through `poll`, which returns at
//! most `max_events` items and never blocks beyond a short bound. Sources
//! that receive asynchronously (syslog UDP, HTTP listener) run a background
//! worker that produces into a bounded queue; `poll` only drains the queue.

mod file_tail;
mod http_listener;
mod syslog_udp;

pub use file_tail::FileTailSource;
pub use http_listener::HttpListenerSource;
pub use syslog_udp::SyslogUdpSource;

use crate::events::Event;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by sources.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source path not found: {0}")]
    PathNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bind failed on {addr}: {err}")]
    Bind { addr: String, err: std::io::Error },
}

impl SourceError {
    /// Short kind label used in runner error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathNotFound(_) => "PathNotFound",
            Self::Io(_) => "Io",
            Self::Bind { .. } => "Bind",
        }
    }
}

/// A source produces events for exactly one pipeline.
#[async_trait]
pub trait Source: Send {
    /// Return up to `max_events` newly available events.
    async fn poll(&mut self, max_events: usize) -> Result<Vec<Event>, SourceError>;

    /// Stop background workers and release sockets/handles.
    fn close(&mut self) {}

    /// Events dropped on queue overflow since startup.
    fn dropped(&self) -> u64 {
        0
    }
}
