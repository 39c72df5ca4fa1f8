//! Admin audit log repository

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::{Pagination, admin::AuditEntry};

/// Append-only log of admin mutations
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one entry
    pub async fn record(
        &self,
        admin_id: Uuid,
        action: &str,
        target_type: &str,
        target_id: Option<&str>,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_audit_log (admin_id, action, target_type, target_id, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(admin_id)
        .bind(action)
        .bind(target_type)
        .bind(target_id)
        .bind(details)
        .execute(&self.pool)
        .await?;

        info!(
            "Admin {} {} {} {}",
            admin_id,
            action,
            target_type,
            target_id.unwrap_or("-")
        );
        Ok(())
    }

    /// Entries, newest first
    pub async fn list(&self, pagination: &Pagination) -> Result<(Vec<AuditEntry>, i64)> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, admin_id, action, target_type, target_id, details, created_at
            FROM admin_audit_log
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(pagination.limit() as i64)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_audit_log")
            .fetch_one(&self.pool)
            .await?;

        Ok((entries, total))
    }
}
