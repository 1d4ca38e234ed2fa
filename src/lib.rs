//! Observix: distributed log collection fabric.
//!
//! Three process roles share this crate:
//!
//! - **Control plane** (`observix-control-plane`): persists agents,
//!   pipelines, and assignments; serves the revision-tagged pull protocol.
//! - **Agent** (`observix-agent`): registers, heartbeats, pulls its
//!   assignment set, and runs the assigned pipelines.
//! - **Indexer** (`observix-indexer`): normalizes raw lines by profile,
//!   called by the agents' indexed processor.

pub mod agent;
pub mod config;
pub mod control_plane;
pub mod destinations;
pub mod events;
pub mod indexer;
pub mod pipeline;
pub mod processors;
pub mod retry;
pub mod sources;
pub mod types;

// Re-export the types most callers touch.
pub use events::Event;
pub use types::{Assignment, AssignmentsResponse, PipelineSpec};
