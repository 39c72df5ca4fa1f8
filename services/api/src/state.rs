//! Application state shared across handlers

use std::sync::Arc;

use common::{
    cache::RedisPool, jwt::JwtService, profiles::ProfileRepository, settings::ServiceSettings,
};
use sqlx::PgPool;

use crate::{
    feed::UsageFeed,
    repositories::{
        AnnouncementRepository, AuditRepository, ReleaseRepository, SettingsRepository,
        UsageRepository, UserDirectory,
    },
    storage::Storage,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ServiceSettings>,
    pub redis_pool: RedisPool,
    pub jwt_service: JwtService,
    pub storage: Storage,
    pub feed: Arc<UsageFeed>,
    pub profile_repository: ProfileRepository,
    pub usage_repository: UsageRepository,
    pub announcement_repository: AnnouncementRepository,
    pub settings_repository: SettingsRepository,
    pub release_repository: ReleaseRepository,
    pub audit_repository: AuditRepository,
    pub user_directory: UserDirectory,
}

impl AppState {
    pub fn new(
        settings: ServiceSettings,
        pool: PgPool,
        redis_pool: RedisPool,
        jwt_service: JwtService,
        storage: Storage,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            redis_pool,
            jwt_service,
            storage,
            feed: Arc::new(UsageFeed::default()),
            profile_repository: ProfileRepository::new(pool.clone()),
            usage_repository: UsageRepository::new(pool.clone()),
            announcement_repository: AnnouncementRepository::new(pool.clone()),
            settings_repository: SettingsRepository::new(pool.clone()),
            release_repository: ReleaseRepository::new(pool.clone()),
            audit_repository: AuditRepository::new(pool.clone()),
            user_directory: UserDirectory::new(pool),
        }
    }
}
