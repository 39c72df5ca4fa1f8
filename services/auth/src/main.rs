use anyhow::Result;
use tracing::info;

mod devices;
mod error;
mod mailer;
mod middleware;
mod models;
mod otp;
mod rate_limiter;
mod repositories;
mod routes;
mod state;
mod validation;

use common::{
    cache::{RedisConfig, RedisPool},
    database,
    jwt::{JwtConfig, JwtService},
    settings::ServiceSettings,
    telemetry,
};
use tokio::net::TcpListener;

use crate::{
    mailer::{Mailer, MailerConfig},
    otp::{OTP_TTL_SECONDS, OtpStore},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::AttemptRepository,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init("auth");

    info!("Starting authentication service");

    let settings = ServiceSettings::load("auth", 3000)?;

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    database::run_migrations(&pool).await?;

    // Initialize JWT service
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    // Initialize Redis connection pool
    let redis_pool = RedisPool::new(&RedisConfig::from_env()?)?;
    if !redis_pool.health_check().await? {
        anyhow::bail!("Failed to connect to Redis");
    }

    let limiter_config = RateLimiterConfig::from_env();
    let rate_limiter = match std::env::var("RATE_LIMIT_BACKEND").as_deref() {
        Ok("memory") => {
            info!("Using in-memory rate limiter");
            RateLimiter::in_memory(limiter_config)
        }
        _ => RateLimiter::new(limiter_config, AttemptRepository::new(pool.clone())),
    };

    let otp_store = OtpStore::new(redis_pool.clone(), OTP_TTL_SECONDS);
    let mailer = Mailer::from_config(MailerConfig::from_env());

    let bind_address = settings.bind_address.clone();
    let app_state = AppState::new(
        settings,
        pool,
        redis_pool,
        jwt_service,
        rate_limiter,
        otp_store,
        mailer,
    );

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&bind_address).await?;
    info!("Authentication service listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
