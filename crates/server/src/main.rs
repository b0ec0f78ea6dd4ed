mod bootstrap;
mod routes;

use std::future::IntoFuture;
use std::time::Duration;

use anyhow::{Context, Result};
use leadflow_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use leadflow_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let bind = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let drain_secs = app.config.server.graceful_shutdown_secs;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("could not bind to {bind}"))?;

    tracing::info!(
        event_name = "system.server.started",
        bind = %bind,
        "leadflow-server listening"
    );

    let server = axum::serve(listener, routes::router(app.state)).with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    let server_task = tokio::spawn(server.into_future());

    tokio::signal::ctrl_c().await.context("could not listen for shutdown signal")?;
    tracing::info!(
        event_name = "system.server.stopping",
        drain_secs,
        "leadflow-server stopping, draining open connections"
    );

    match tokio::time::timeout(Duration::from_secs(drain_secs), server_task).await {
        Ok(joined) => joined.context("server task failed")?.context("server error")?,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.drain_timeout",
                drain_secs,
                "open connections did not drain in time, exiting anyway"
            );
        }
    }

    Ok(())
}
