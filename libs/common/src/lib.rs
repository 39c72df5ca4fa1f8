//! Common library for the portal services
//!
//! This crate provides shared functionality used across the portal
//! services: database connectivity and migrations, the Redis cache, JWT
//! handling, the profile repository, settings loading and tracing setup.

pub mod cache;
pub mod database;
pub mod error;
pub mod hashing;
pub mod jwt;
pub mod profiles;
pub mod settings;
pub mod telemetry;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, init_pool, health_check, run_migrations};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     run_migrations(&pool).await?;
///     let is_healthy = health_check(&pool).await?;
///     println!("Database health check: {}", is_healthy);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
