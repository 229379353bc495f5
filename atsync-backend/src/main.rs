//! atsync backend server
//!
//! Entry point: loads configuration, picks the job queue backend once, and
//! serves the import and sync-trigger API.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use atsync_backend::dispatch::{BaseUrlPolicy, JobDispatcher};
use atsync_backend::state::{AppState, SiteSettings};

mod cli;
mod config_helpers;
mod tracing_setup;

use cli::CliArgs;
use config_helpers::{parse_bind_address, queue_settings_from_config, sync_store_from_config};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config_path = args.resolve_config_path();

    let config = load_config(config_path.as_deref())?;
    install_tracing_from_config(&config.logging);
    tracing::info!(config_path = ?config_path, "configuration loaded");

    atsync_config::validate_config(&config).context("invalid configuration")?;

    // The backend is chosen exactly once; everything downstream holds this Arc.
    let backend = atsync_job_queue::select_backend(&queue_settings_from_config(&config))
        .await
        .context("failed to initialise job queue backend")?;
    atsync_jobs::register_all_executors(backend.as_ref()).await;

    let sources = sync_store_from_config(&config).context("failed to load sync sources")?;
    let base_url = BaseUrlPolicy::from_config(&config);
    tracing::info!(
        backend = %backend.kind(),
        base_url_policy = ?base_url,
        container = config.deployment.container,
        "job dispatch configured"
    );

    let dispatcher = JobDispatcher::new(backend, sources, base_url);
    let state = Arc::new(AppState::new(dispatcher, SiteSettings::from_config(&config)));
    let app = atsync_backend::build_router(state);

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Load configuration from file or defaults.
fn load_config(path: Option<&str>) -> anyhow::Result<atsync_config::Config> {
    match path {
        Some(p) => atsync_config::load_config(Some(p)),
        None => atsync_config::load_config::<&std::path::Path>(None),
    }
    .map_err(|e| {
        eprintln!("failed to load configuration: {e}");
        anyhow::anyhow!(e.to_string())
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
