//! Trusted device repository

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DeviceStatus, TrustedDevice};

const DEVICE_COLUMNS: &str = "id, user_id, device_id, token_hash, status, label, created_at, \
                              confirmed_at, last_seen_at, expires_at";

/// Trusted device repository
#[derive(Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    /// Create a new device repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending device claim
    pub async fn create_pending(
        &self,
        user_id: Uuid,
        device_id: &str,
        token_hash: &str,
        label: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<TrustedDevice> {
        let device = sqlx::query_as::<_, TrustedDevice>(&format!(
            r#"
            INSERT INTO trusted_devices (user_id, device_id, token_hash, status, label, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(device_id)
        .bind(token_hash)
        .bind(DeviceStatus::Pending.as_str())
        .bind(label)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(device)
    }

    /// Find a device by its public device id
    pub async fn find_by_device_id(&self, device_id: &str) -> Result<Option<TrustedDevice>> {
        let device = sqlx::query_as::<_, TrustedDevice>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM trusted_devices WHERE device_id = $1"
        ))
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// Promote a pending device to trusted. Returns `None` if it was no longer pending.
    pub async fn mark_trusted(
        &self,
        id: Uuid,
        trusted_until: DateTime<Utc>,
    ) -> Result<Option<TrustedDevice>> {
        let device = sqlx::query_as::<_, TrustedDevice>(&format!(
            r#"
            UPDATE trusted_devices
            SET status = 'trusted', confirmed_at = NOW(), last_seen_at = NOW(), expires_at = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(trusted_until)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// Record that a trusted device was just used
    pub async fn touch(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE trusted_devices SET last_seen_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Revoke one of the user's devices. Returns `None` if it does not exist,
    /// belongs to someone else, or is already revoked.
    pub async fn revoke(&self, id: Uuid, user_id: Uuid) -> Result<Option<TrustedDevice>> {
        let device = sqlx::query_as::<_, TrustedDevice>(&format!(
            r#"
            UPDATE trusted_devices
            SET status = 'revoked'
            WHERE id = $1 AND user_id = $2 AND status <> 'revoked'
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// List the devices of a user, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TrustedDevice>> {
        let devices = sqlx::query_as::<_, TrustedDevice>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM trusted_devices WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }
}
