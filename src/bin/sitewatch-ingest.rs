use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use sitewatch::config::Config;
use sitewatch::ingest;
use sitewatch::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "sitewatch-ingest")]
#[command(about = "Load monitoring CSV files into the sitewatch database", long_about = None)]
struct Cli {
    /// Status poll CSV (store_id, status, timestamp_utc)
    #[arg(long)]
    status: Option<PathBuf>,

    /// Business hours CSV (store_id, day_of_week, start_time_local, end_time_local)
    #[arg(long)]
    business_hours: Option<PathBuf>,

    /// Timezone CSV (store_id, timezone)
    #[arg(long)]
    timezones: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if cli.status.is_none() && cli.business_hours.is_none() && cli.timezones.is_none() {
        anyhow::bail!("nothing to load: pass --status, --business-hours and/or --timezones");
    }

    let config = Config::from_env()?;
    let storage: Arc<dyn Storage> = Arc::new(
        SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
    );

    // Ensure database is initialized
    storage.init().await?;

    if let Some(path) = cli.timezones {
        let stats = ingest::load_timezones_csv(storage.as_ref(), &path).await?;
        println!(
            "✓ Loaded {} timezone rows from {} ({} skipped)",
            stats.inserted,
            path.display(),
            stats.skipped
        );
    }

    if let Some(path) = cli.business_hours {
        let stats = ingest::load_business_hours_csv(storage.as_ref(), &path).await?;
        println!(
            "✓ Loaded {} business-hours rows from {} ({} skipped)",
            stats.inserted,
            path.display(),
            stats.skipped
        );
    }

    if let Some(path) = cli.status {
        let stats = ingest::load_status_csv(storage.as_ref(), &path).await?;
        println!(
            "✓ Loaded {} status rows from {} ({} skipped)",
            stats.inserted,
            path.display(),
            stats.skipped
        );
    }

    Ok(())
}
