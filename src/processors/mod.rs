//! Processors transform batches between source and destination.

mod indexed;
mod raw;

pub use indexed::{IndexedOptions, IndexedProcessor};
pub use raw::RawProcessor;

use crate::events::Event;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by processors.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("indexer rejected request (422): {0}")]
    InvalidRequest(String),
    #[error("indexer returned no documents")]
    EmptyResponse,
    #[error("unexpected indexer response shape: {0}")]
    InvalidResponse(String),
    #[error("invalid indexer URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("indexer returned status {0}")]
    ServerStatus(reqwest::StatusCode),
}

impl ProcessorError {
    /// Short kind label used in runner error strings.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::EmptyResponse => "EmptyResponse",
            Self::InvalidResponse(_) => "InvalidResponse",
            Self::InvalidUrl(_) => "InvalidUrl",
            Self::Http(_) => "Http",
            Self::ServerStatus(_) => "ServerStatus",
        }
    }
}

/// A processor maps a batch of events to a new batch.
///
/// The input is borrowed: on failure the runner keeps the original batch
/// inflight and re-processes it on the next send attempt, so nothing is
/// dropped when the indexer rejects a batch.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, events: &[Event]) -> Result<Vec<Event>, ProcessorError>;
}
