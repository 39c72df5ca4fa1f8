//! Application state shared across handlers

use std::sync::Arc;

use common::{
    cache::RedisPool, jwt::JwtService, profiles::ProfileRepository, settings::ServiceSettings,
};
use sqlx::PgPool;

use crate::{
    mailer::Mailer,
    otp::OtpStore,
    rate_limiter::RateLimiter,
    repositories::{DeviceRepository, UserRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServiceSettings>,
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub user_repository: UserRepository,
    pub profile_repository: ProfileRepository,
    pub device_repository: DeviceRepository,
    pub rate_limiter: RateLimiter,
    pub otp_store: OtpStore,
    pub mailer: Mailer,
}

impl AppState {
    /// Wire repositories over `pool` and services over `redis_pool`
    pub fn new(
        settings: ServiceSettings,
        pool: PgPool,
        redis_pool: RedisPool,
        jwt_service: JwtService,
        rate_limiter: RateLimiter,
        otp_store: OtpStore,
        mailer: Mailer,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            redis_pool,
            jwt_service,
            user_repository: UserRepository::new(pool.clone()),
            profile_repository: ProfileRepository::new(pool.clone()),
            device_repository: DeviceRepository::new(pool),
            rate_limiter,
            otp_store,
            mailer,
        }
    }
}
