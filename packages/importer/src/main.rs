use anyhow::Context;
use db::Database;
use importer::{AppConfig, ImportService};
use jobfeed_core::Priority;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db = Database::connect(&config.db)
        .await
        .with_context(|| format!("failed to open database at {}", config.db.endpoint))?;

    let service = ImportService::start(db, &config)
        .await
        .context("failed to start import service")?;

    let triggered = service
        .trigger_import(None, Priority::Normal)
        .await
        .context("failed to trigger initial import")?;
    tracing::info!(
        "Triggered import of {} sources ({} queued)",
        triggered.urls.len(),
        triggered.task_ids.len()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    service.shutdown().await.context("failed to shut down cleanly")?;
    Ok(())
}
