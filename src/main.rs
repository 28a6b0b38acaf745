//! Voyage track processing worker

use std::sync::Arc;

use tokio::{signal, sync::watch};
use tracing::{error, info, warn};

use voyage_worker::{
    config::AppConfig, database::Database, errors::VoyageWorkerError, regions::RegionIndex,
    scheduler::Scheduler, simplifier::Simplifier,
};

#[tokio::main]
async fn main() -> Result<(), VoyageWorkerError> {
    #[cfg(feature = "dotenv")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let regions = load_regions(&config);
    let db = Database::connect(&config.database).await?;

    let simplifier = Simplifier::new(Arc::new(regions), config.simplifier.clone());
    let scheduler = Scheduler::new(db, simplifier, config.scheduler.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Unable to listen for shutdown signal: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;

    Ok(())
}

/// Region index from the configured file; trips go untagged without one
fn load_regions(config: &AppConfig) -> RegionIndex {
    let Some(path) = &config.regions.path else {
        warn!("No region file configured, trips will not be tagged with regions");
        return RegionIndex::empty();
    };

    match RegionIndex::load(path, &config.regions.name_property) {
        Ok(index) => {
            info!("Loaded {} regions from {}", index.len(), path.display());
            index
        }
        Err(e) => {
            error!("Failed to load regions from {}: {}", path.display(), e);
            RegionIndex::empty()
        }
    }
}
