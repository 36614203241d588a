use anyhow::Context;
use deployment::{Deployment, ServerConfig};
use server::{DeploymentImpl, routes};
use tracing::info;
use utils::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = ServerConfig::from_env()?;
    let addr = config.socket_addr();
    let deployment = DeploymentImpl::new(config)
        .await
        .context("failed to open the studio database")?;

    let app = routes::router(deployment);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(address = %addr, "Admin API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Admin API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
