//! CMS HTTP server
//!
//! Serves template, model and record endpoints over the in-memory store.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use gif_cms::{build_router, logging, AppState, CmsConfig};
use tracing::info;

#[derive(Parser)]
#[command(name = "gif-cms-server")]
#[command(about = "Serve the GIF template registry and record store over HTTP")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<String>,

    /// Listen address, overrides server.bind
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = CmsConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    logging::init(&config.logging);

    let bind = cli.bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;

    let state = AppState::from_config(&config).context("building template registry")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "gif-cms-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gif-cms-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
