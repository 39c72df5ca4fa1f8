//! Attempts log backing the rate limiter

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// Attempt log repository
#[derive(Clone)]
pub struct AttemptRepository {
    pool: PgPool,
}

impl AttemptRepository {
    /// Create a new attempt repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an attempt row
    pub async fn record(&self, key: &str, succeeded: bool, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT INTO auth_attempts (key, succeeded, created_at) VALUES ($1, $2, $3)")
            .bind(key)
            .bind(succeeded)
            .bind(at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Count failures for `key` after `since`, with the oldest counted one
    pub async fn failures_since(
        &self,
        key: &str,
        since: DateTime<Utc>,
    ) -> Result<(u32, Option<DateTime<Utc>>)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS failures, MIN(created_at) AS oldest
            FROM auth_attempts
            WHERE key = $1 AND NOT succeeded AND created_at > $2
            "#,
        )
        .bind(key)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        let failures: i64 = row.get("failures");
        let oldest: Option<DateTime<Utc>> = row.get("oldest");

        Ok((u32::try_from(failures).unwrap_or(u32::MAX), oldest))
    }
}
