use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use sitewatch::api;
use sitewatch::config::Config;
use sitewatch::report::ReportJobs;
use sitewatch::storage::{SqliteStorage, Storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    info!("Using SQLite storage: {}", config.database.url);
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    info!("Initializing database...");
    storage.init().await?;
    info!("Database initialized successfully");

    // Report job registry
    let jobs = ReportJobs::new(
        Arc::clone(&storage),
        &config.report.output_dir,
        config.report.batch_size,
    );

    let router = api::create_api_router(jobs);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 API server listening on http://{}", addr);
    info!("   - POST http://{}/trigger_report", addr);
    info!("   - GET  http://{}/get_report?report_id=...", addr);

    axum::serve(listener, router).await?;

    Ok(())
}
