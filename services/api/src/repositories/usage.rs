//! Usage window and usage event repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::settings::QuotaSettings;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{
        Pagination,
        usage::{UsageEvent, UsageKind, UsageWindow},
    },
    usage::next_window_start,
};

/// Usage repository for database operations
#[derive(Clone)]
pub struct UsageRepository {
    pool: PgPool,
}

impl UsageRepository {
    /// Create a new usage repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stored window of a user, expired or not
    pub async fn find_window(&self, user_id: Uuid) -> Result<Option<UsageWindow>> {
        let window = sqlx::query_as::<_, UsageWindow>(
            r#"
            SELECT user_id, used_seconds, window_start, window_seconds, max_usage_seconds, updated_at
            FROM usage_windows
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(window)
    }

    /// Sum of every recorded second of a user
    pub async fn total_seconds(&self, user_id: Uuid) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(seconds), 0)::BIGINT FROM usage_events WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    /// Append a session event and recompute the window it falls in
    ///
    /// An expired or missing window restarts at `now` with the current
    /// quota settings; a live one keeps its start and caps.
    pub async fn record_session(
        &self,
        user_id: Uuid,
        seconds: i64,
        quota: &QuotaSettings,
        now: DateTime<Utc>,
    ) -> Result<UsageWindow> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO usage_events (user_id, kind, seconds, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(UsageKind::Session.as_str())
        .bind(seconds)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let existing = sqlx::query_as::<_, UsageWindow>(
            r#"
            SELECT user_id, used_seconds, window_start, window_seconds, max_usage_seconds, updated_at
            FROM usage_windows
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let window_start = next_window_start(existing.as_ref(), now);
        let (window_seconds, max_usage_seconds) = match &existing {
            Some(window) if window.window_start == window_start => {
                (window.window_seconds, window.max_usage_seconds)
            }
            _ => (quota.window_seconds, quota.max_usage_seconds),
        };

        let used_seconds: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(seconds), 0)::BIGINT
            FROM usage_events
            WHERE user_id = $1 AND kind = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(UsageKind::Session.as_str())
        .bind(window_start)
        .fetch_one(&mut *tx)
        .await?;

        let window = sqlx::query_as::<_, UsageWindow>(
            r#"
            INSERT INTO usage_windows
                (user_id, used_seconds, window_start, window_seconds, max_usage_seconds, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                used_seconds = EXCLUDED.used_seconds,
                window_start = EXCLUDED.window_start,
                window_seconds = EXCLUDED.window_seconds,
                max_usage_seconds = EXCLUDED.max_usage_seconds,
                updated_at = EXCLUDED.updated_at
            RETURNING user_id, used_seconds, window_start, window_seconds, max_usage_seconds, updated_at
            "#,
        )
        .bind(user_id)
        .bind(used_seconds)
        .bind(window_start)
        .bind(window_seconds)
        .bind(max_usage_seconds)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(window)
    }

    /// Log an admitted download
    pub async fn record_download(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_events (user_id, kind, seconds, created_at) VALUES ($1, $2, 0, $3)",
        )
        .bind(user_id)
        .bind(UsageKind::Download.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Usage history, newest first
    pub async fn list_events(
        &self,
        user_id: Uuid,
        pagination: &Pagination,
    ) -> Result<(Vec<UsageEvent>, i64)> {
        let events = sqlx::query_as::<_, UsageEvent>(
            r#"
            SELECT id, user_id, kind, seconds, created_at
            FROM usage_events
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_events WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((events, total))
    }

    /// Forget all usage of a user; returns the number of events removed
    pub async fn reset(&self, user_id: Uuid) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM usage_windows WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM usage_events WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(deleted)
    }
}
