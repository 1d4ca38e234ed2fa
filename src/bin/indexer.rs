//! Observix Indexer: profile-based line normalization service.
//!
//! ```bash
//! observix-indexer --host 127.0.0.1 --port 7100
//! ```

use clap::Parser;
use observix::indexer::api;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "observix-indexer", about = "Observix log normalization service")]
struct CliArgs {
    /// Bind host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port
    #[arg(long, short, default_value_t = 7100)]
    port: u16,
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
    let addr = format!("{}:{}", args.host, args.port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "indexer listening");

    axum::serve(listener, api::build_router())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("indexer shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
