//! Event destinations for pipelines.
//!
//! `send` either completes, meaning the whole batch was accepted by the
//! remote (or flushed to disk), or fails as a unit. Partial acceptance is
//! reported as failure; the runner keeps the batch inflight and retries.

mod file;
mod http;
mod syslog_udp;

pub use file::FileDestination;
pub use http::HttpDestination;
pub use syslog_udp::SyslogUdpDestination;

use crate::events::Event;
use crate::processors::ProcessorError;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by destinations (and by processing on the send path).
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    ServerStatus(reqwest::StatusCode),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}

impl DestinationError {
    /// Short kind label used in runner error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "Io",
            Self::Http(_) => "Http",
            Self::ServerStatus(_) => "ServerStatus",
            Self::Serialization(_) => "Serialization",
            Self::Processor(e) => e.kind(),
        }
    }
}

/// A destination delivers event batches to an external target.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Send a batch; returning `Ok` acknowledges the whole batch.
    async fn send(&self, batch: &[Event]) -> Result<(), DestinationError>;
}
