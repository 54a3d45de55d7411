//! HTTP proxy that forwards single video frames to a hosted vision model
//! and answers with one caption per frame.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod upstream;

use std::future::Future;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

pub use config::UpstreamConfig;
pub use error::ProxyError;
pub use routes::{router, AppState};
pub use upstream::UpstreamClient;

/// Serve the proxy on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, model = %state.upstream().config().model, "proxy listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("proxy server failed")
}
