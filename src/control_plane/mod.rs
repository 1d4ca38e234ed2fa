//! Control plane: persistence and HTTP API for agents, pipelines, and
//! assignments.
//!
//! ## Modules
//!
//! - `config` — YAML config with environment overrides
//! - `db` — connection pool and migration runner
//! - `spec` — spec blob normalize/sanitize and the assignment ETag
//! - `api` — HTTP route handlers

pub mod api;
pub mod config;
pub mod db;
pub mod spec;

use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared control-plane application state.
pub struct ControlPlaneState {
    /// Database connection pool.
    pub db: SqlitePool,
    /// Loaded configuration.
    pub config: config::ControlPlaneConfig,
}

impl ControlPlaneState {
    pub fn new(db: SqlitePool, config: config::ControlPlaneConfig) -> Arc<Self> {
        Arc::new(Self { db, config })
    }
}
