//! Profile model and repository shared by the auth and API services

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::settings::QuotaSettings;

/// One row per end user: quota limit, admin flag, disabled/ban state
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub quota_limit_seconds: i64,
    pub is_admin: bool,
    pub disabled: bool,
    pub banned_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Whether the account may not sign in or download at `now`
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.disabled || self.banned_until.is_some_and(|until| until > now)
    }
}

/// Profile repository
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the profile of a user
    pub async fn find(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT user_id, display_name, quota_limit_seconds, is_admin, disabled,
                   banned_until, created_at, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Return the user's profile, creating one with default quota if absent
    pub async fn find_or_create(
        &self,
        user_id: Uuid,
        default_quota_seconds: i64,
    ) -> Result<Profile> {
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, quota_limit_seconds)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(default_quota_seconds)
        .execute(&self.pool)
        .await?;

        self.find(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Profile for {} vanished after insert", user_id))
    }

    /// Create the profile and the first usage window of a freshly signed-up user
    pub async fn create(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
        quota: &QuotaSettings,
    ) -> Result<Profile> {
        info!("Creating profile for user: {}", user_id);

        let mut tx = self.pool.begin().await?;

        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, display_name, quota_limit_seconds)
            VALUES ($1, $2, $3)
            RETURNING user_id, display_name, quota_limit_seconds, is_admin, disabled,
                      banned_until, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .bind(quota.default_limit_seconds)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO usage_windows (user_id, window_seconds, max_usage_seconds)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(quota.window_seconds)
        .bind(quota.max_usage_seconds)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(profile)
    }

    /// Update the user-editable part of the profile
    pub async fn update_display_name(
        &self,
        user_id: Uuid,
        display_name: Option<&str>,
    ) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET display_name = $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, display_name, quota_limit_seconds, is_admin, disabled,
                      banned_until, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Persist every mutable column of `profile`
    pub async fn save(&self, profile: &Profile) -> Result<Profile> {
        let saved = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET display_name = $2, quota_limit_seconds = $3, is_admin = $4,
                disabled = $5, banned_until = $6, updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, display_name, quota_limit_seconds, is_admin, disabled,
                      banned_until, created_at, updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.display_name)
        .bind(profile.quota_limit_seconds)
        .bind(profile.is_admin)
        .bind(profile.disabled)
        .bind(profile.banned_until)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile() -> Profile {
        let now = Utc::now();
        Profile {
            user_id: Uuid::new_v4(),
            display_name: None,
            quota_limit_seconds: 3600,
            is_admin: false,
            disabled: false,
            banned_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_active_profile_is_not_blocked() {
        assert!(!profile().is_blocked(Utc::now()));
    }

    #[test]
    fn test_disabled_profile_is_blocked() {
        let mut p = profile();
        p.disabled = true;
        assert!(p.is_blocked(Utc::now()));
    }

    #[test]
    fn test_ban_blocks_only_until_it_lapses() {
        let now = Utc::now();
        let mut p = profile();
        p.banned_until = Some(now + Duration::hours(1));

        assert!(p.is_blocked(now));
        assert!(!p.is_blocked(now + Duration::hours(2)));
    }
}
