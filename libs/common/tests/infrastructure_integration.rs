//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL (with the portal schema) and Redis
//! are reachable from the services. They need live instances, so they are
//! ignored by default: `cargo test -- --ignored`.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires PostgreSQL and Redis"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    run_migrations(&pool).await?;

    let row = sqlx::query("SELECT value FROM site_settings WHERE key = 'usage_window_enabled'")
        .fetch_one(&pool)
        .await?;
    let value: serde_json::Value = row.get("value");
    assert!(value.is_boolean(), "seeded setting should be a boolean");

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config)?;

    assert!(
        redis_pool.health_check().await?,
        "Redis health check failed"
    );

    let test_key = "integration_test_key";
    redis_pool.set(test_key, "integration_test_value", Some(10)).await?;

    let taken = redis_pool.take(test_key).await?;
    assert_eq!(taken.as_deref(), Some("integration_test_value"));

    let retrieved_value = redis_pool.get(test_key).await?;
    assert_eq!(retrieved_value, None, "GETDEL should consume the key");

    Ok(())
}
