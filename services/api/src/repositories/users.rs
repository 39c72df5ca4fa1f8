//! Read access to accounts for the admin console

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::{Pagination, admin::AdminUser};

/// Identity columns of a user
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern
pub fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Users joined with their profiles
#[derive(Clone)]
pub struct UserDirectory {
    pool: PgPool,
}

impl UserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT email, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Users, newest first, optionally filtered by email substring
    ///
    /// Users still lacking a profile row show `default_quota_seconds`.
    pub async fn list(
        &self,
        search: Option<&str>,
        pagination: &Pagination,
        default_quota_seconds: i64,
    ) -> Result<(Vec<AdminUser>, i64)> {
        let pattern = search
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(like_pattern);

        let users = sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT u.id, u.email, p.display_name,
                   COALESCE(p.quota_limit_seconds, $2) AS quota_limit_seconds,
                   COALESCE(p.is_admin, FALSE) AS is_admin,
                   COALESCE(p.disabled, FALSE) AS disabled,
                   p.banned_until, u.created_at
            FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            WHERE $1::TEXT IS NULL OR u.email ILIKE $1
            ORDER BY u.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&pattern)
        .bind(default_quota_seconds)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR email ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok((users, total))
    }
}
