//! Observix Control Plane: assignment service for the agent fleet.
//!
//! ```bash
//! observix-control-plane --config config/control_plane.yaml
//! DATABASE_URL=sqlite:///var/lib/observix/cp.db observix-control-plane
//! ```

use clap::Parser;
use observix::control_plane::config::ControlPlaneConfig;
use observix::control_plane::{api, db, ControlPlaneState};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "observix-control-plane",
    about = "Observix control plane: agents, pipelines, assignments"
)]
struct CliArgs {
    /// Path to the control-plane YAML config (defaults apply without it)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(long, short)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (DATABASE_URL etc.)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let mut config = ControlPlaneConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }

    info!(bind = %config.bind_address(), "starting Observix control plane");

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let state = ControlPlaneState::new(pool, config.clone());
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "control plane listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("control plane shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
