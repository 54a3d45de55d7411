mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use framelens_proxy::extract::extract_caption;
use framelens_proxy::{AppState, UpstreamClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Serve { port, upstream } => {
            info!(port, ?upstream, "starting proxy");
            let client = UpstreamClient::new(upstream).context("failed to build upstream client")?;
            let listener = TcpListener::bind(("0.0.0.0", port))
                .await
                .with_context(|| format!("failed to bind port {port}"))?;

            framelens_proxy::serve(listener, AppState::new(client), shutdown_signal()).await?;
            info!("proxy stopped");
            Ok(())
        }
        cli::Command::Check { upstream } => {
            info!(?upstream, "checking upstream connectivity");
            let client = UpstreamClient::new(upstream).context("failed to build upstream client")?;
            let body = client.probe().await.context("upstream check failed")?;

            info!(upstream_id = ?body.id, "upstream reachable");
            println!("{}", extract_caption(&body));
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(err) => {
            warn!(error = %err, "cannot listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
