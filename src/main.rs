mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use talk_to_core::{ConfigStore, HttpCalendarSource, TalkTo};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "talk-to-server")]
#[command(about = "Publish when you are free, computed from your calendar feeds")]
struct Cli {
    /// Path to the config file (JSON, TOML or YAML)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("talk_to_server=info,talk_to_core=info,tower_http=info")
        }))
        .init();

    let cli = Cli::parse();

    let config = ConfigStore::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let talk_to = Arc::new(TalkTo::new(config, Arc::new(HttpCalendarSource::new())));
    talk_to.start();

    let app = routes::router(AppState::new(talk_to.clone()));

    let listener = tokio::net::TcpListener::bind(cli.bind).await?;
    info!("talk-to-server listening on http://{}", cli.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    talk_to.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
