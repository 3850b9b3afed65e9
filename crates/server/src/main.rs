mod api;
mod bootstrap;
mod health;

use anyhow::Result;
use deedcraft_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use deedcraft_core::config::LogFormat::*;
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

    let app = bootstrap::bootstrap_with_config(config).await?;

    let state = api::ApiState {
        store: app.store.clone(),
        session_id: app.session_id.clone(),
        pipeline: app.pipeline.clone(),
    };
    let router = api::router(state).merge(health::router(app.store.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    tracing::info!(
        event_name = "system.server.started",
        session_id = %app.session_id,
        bind_address = %address,
        "deedcraft-server started"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        session_id = %app.session_id,
        "deedcraft-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!(
            event_name = "system.server.signal_error",
            "ctrl-c handler failed, shutting down"
        );
    }
}
