//! Announcement repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::content::Announcement;

const COLUMNS: &str = "id, title, body, level, starts_at, ends_at, created_at, updated_at";

/// Announcement repository
#[derive(Clone)]
pub struct AnnouncementRepository {
    pool: PgPool,
}

impl AnnouncementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every announcement, newest start first
    pub async fn list(&self) -> Result<Vec<Announcement>> {
        let announcements = sqlx::query_as::<_, Announcement>(&format!(
            "SELECT {COLUMNS} FROM announcements ORDER BY starts_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(announcements)
    }

    /// Announcements visible at `now`
    pub async fn visible(&self, now: DateTime<Utc>) -> Result<Vec<Announcement>> {
        let announcements = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            SELECT {COLUMNS} FROM announcements
            WHERE starts_at <= $1 AND (ends_at IS NULL OR ends_at > $1)
            ORDER BY starts_at DESC
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(announcements)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Announcement>> {
        let announcement = sqlx::query_as::<_, Announcement>(&format!(
            "SELECT {COLUMNS} FROM announcements WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(announcement)
    }

    pub async fn insert(&self, announcement: &Announcement) -> Result<Announcement> {
        let saved = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            INSERT INTO announcements
                (id, title, body, level, starts_at, ends_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.body)
        .bind(announcement.level.as_str())
        .bind(announcement.starts_at)
        .bind(announcement.ends_at)
        .bind(announcement.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    pub async fn save(&self, announcement: &Announcement) -> Result<Announcement> {
        let saved = sqlx::query_as::<_, Announcement>(&format!(
            r#"
            UPDATE announcements
            SET title = $2, body = $3, level = $4, starts_at = $5, ends_at = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.body)
        .bind(announcement.level.as_str())
        .bind(announcement.starts_at)
        .bind(announcement.ends_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
