//! Pipeline engine: typed spec parsing and the per-pipeline runner.
//!
//! One [`PipelineRunner`] owns one source, one processor, one destination,
//! and all batching/retry state. Runners are driven cooperatively by the
//! agent's tick loop and replaced wholesale on spec changes; in-place
//! mutation is never attempted because sources hold sockets and handles.

mod runner;
pub mod spec;

pub use runner::{PipelineRunner, RunnerContext, RunnerStats};
pub use spec::{DestinationSpec, ProcessorSpec, SourceSpec, SpecError};

use crate::destinations::DestinationError;
use crate::processors::ProcessorError;
use crate::sources::SourceError;
use thiserror::Error;

/// Errors surfaced by runner construction and ticks.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Destination(#[from] DestinationError),
    #[error(transparent)]
    Processor(#[from] ProcessorError),
}
