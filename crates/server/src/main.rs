mod bootstrap;
mod health;
pub mod leads;

use anyhow::Result;
use axum::Router;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quill_core::config::{AppConfig, LoadOptions, LogFormat};

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    serve(app).await
}

async fn serve(app: bootstrap::Application) -> Result<()> {
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let router = Router::new()
        .nest("/api/v1", leads::router(app.leads_state.clone()))
        .merge(health::router(app.db_pool.clone()));

    info!(
        event_name = "system.server.started",
        bind_address = %address,
        "quill-server listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(app.config.server.graceful_shutdown_secs))
        .await?;

    info!(event_name = "system.server.stopped", "quill-server stopped");

    Ok(())
}

async fn shutdown_signal(drain_secs: u64) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(
            event_name = "system.server.stopping",
            drain_secs,
            "shutdown signal received; draining connections"
        );
    }
}
