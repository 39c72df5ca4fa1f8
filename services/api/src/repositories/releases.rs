//! Software release repository

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::content::SoftwareRelease;

const COLUMNS: &str =
    "id, version, platform, storage_key, notes, published, created_at, updated_at";

/// Software release repository
#[derive(Clone)]
pub struct ReleaseRepository {
    pool: PgPool,
}

impl ReleaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every release, newest first
    pub async fn list(&self) -> Result<Vec<SoftwareRelease>> {
        let releases = sqlx::query_as::<_, SoftwareRelease>(&format!(
            "SELECT {COLUMNS} FROM software_releases ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(releases)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<SoftwareRelease>> {
        let release = sqlx::query_as::<_, SoftwareRelease>(&format!(
            "SELECT {COLUMNS} FROM software_releases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(release)
    }

    /// Newest published release for a platform
    pub async fn latest_published(&self, platform: &str) -> Result<Option<SoftwareRelease>> {
        let release = sqlx::query_as::<_, SoftwareRelease>(&format!(
            r#"
            SELECT {COLUMNS} FROM software_releases
            WHERE platform = $1 AND published
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(platform)
        .fetch_optional(&self.pool)
        .await?;

        Ok(release)
    }

    /// Newest published release of every platform
    pub async fn latest_published_per_platform(&self) -> Result<Vec<SoftwareRelease>> {
        let releases = sqlx::query_as::<_, SoftwareRelease>(&format!(
            r#"
            SELECT DISTINCT ON (platform) {COLUMNS} FROM software_releases
            WHERE published
            ORDER BY platform, created_at DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(releases)
    }

    pub async fn insert(&self, release: &SoftwareRelease) -> Result<SoftwareRelease> {
        let saved = sqlx::query_as::<_, SoftwareRelease>(&format!(
            r#"
            INSERT INTO software_releases
                (id, version, platform, storage_key, notes, published, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(release.id)
        .bind(&release.version)
        .bind(&release.platform)
        .bind(&release.storage_key)
        .bind(&release.notes)
        .bind(release.published)
        .bind(release.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    pub async fn save(&self, release: &SoftwareRelease) -> Result<SoftwareRelease> {
        let saved = sqlx::query_as::<_, SoftwareRelease>(&format!(
            r#"
            UPDATE software_releases
            SET version = $2, platform = $3, storage_key = $4, notes = $5, published = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(release.id)
        .bind(&release.version)
        .bind(&release.platform)
        .bind(&release.storage_key)
        .bind(&release.notes)
        .bind(release.published)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM software_releases WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
