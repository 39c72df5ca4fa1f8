use anyhow::Result;
use tracing::info;

mod admin;
mod downloads;
mod error;
mod feed;
mod middleware;
mod models;
mod repositories;
mod routes;
mod state;
mod storage;
mod usage;

use common::{
    cache::{RedisConfig, RedisPool},
    database::{self, DatabaseConfig, init_pool},
    jwt::{JwtConfig, JwtService},
    settings::ServiceSettings,
    telemetry,
};
use tokio::net::TcpListener;

use crate::{
    state::AppState,
    storage::{Storage, StorageConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init("api");

    info!("Starting API service");

    let settings = ServiceSettings::load("api", 3001)?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    // Only the public key is needed to verify access tokens
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    let redis_pool = RedisPool::new(&RedisConfig::from_env()?)?;
    let storage = Storage::from_config(StorageConfig::from_env()).await;

    let bind_address = settings.bind_address.clone();
    let app_state = AppState::new(settings, pool, redis_pool, jwt_service, storage);

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&bind_address).await?;
    info!("API service listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
