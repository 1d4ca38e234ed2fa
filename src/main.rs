//! Observix Agent: runs assigned pipelines against a control plane.
//!
//! ```bash
//! observix-agent --config config/agent.yaml
//! RUST_LOG=debug observix-agent -c config/agent.yaml
//! ```

use clap::Parser;
use observix::agent::Agent;
use observix::config::AgentConfig;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "observix-agent", about = "Observix log collection agent")]
struct CliArgs {
    /// Path to the agent YAML config
    #[arg(long, short, env = "OBSERVIX_AGENT_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let config = AgentConfig::load(&args.config)?;

    info!(
        agent_id = %config.agent_id,
        region = %config.region,
        control_plane = %config.control_plane_url,
        "starting Observix agent"
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_cancel.cancel();
        }
    });

    let agent = Agent::new(&config)?;
    agent.run(cancel).await?;

    info!("agent exited cleanly");
    Ok(())
}
