use anyhow::Result;
use tracing::info;

mod config;
mod database;
mod housekeeper;

use common::{
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
    telemetry,
};
use config::MaintenanceConfig;
use database::Database;
use housekeeper::Housekeeper;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init("maintenance");

    info!("Starting maintenance service");

    let config = MaintenanceConfig::from_env()?;

    let pool = init_pool(&DatabaseConfig::from_env()?).await?;
    if !health_check(&pool).await? {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    let housekeeper = Housekeeper::new(Database::new(pool), config.attempt_retention_days);
    let mut scheduler = housekeeper.start(&config.schedule).await?;

    info!("Maintenance service started successfully");

    // Keep the service running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down maintenance service");
    scheduler.shutdown().await?;

    Ok(())
}
