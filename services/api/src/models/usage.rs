//! Usage window and usage event models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored rolling window of one user
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UsageWindow {
    pub user_id: Uuid,
    pub used_seconds: i64,
    pub window_start: DateTime<Utc>,
    pub window_seconds: i64,
    pub max_usage_seconds: i64,
    pub updated_at: DateTime<Utc>,
}

/// What a usage event accounts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    Session,
    Download,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Session => "session",
            UsageKind::Download => "download",
        }
    }
}

impl TryFrom<String> for UsageKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "session" => Ok(UsageKind::Session),
            "download" => Ok(UsageKind::Download),
            other => Err(format!("unknown usage kind: {other}")),
        }
    }
}

/// Append-only usage history entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UsageEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: UsageKind,
    pub seconds: i64,
    pub created_at: DateTime<Utc>,
}

/// Request to record a finished usage session
#[derive(Debug, Deserialize)]
pub struct RecordSessionRequest {
    pub seconds: i64,
}

/// Window state as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowView {
    pub used_seconds: i64,
    pub max_usage_seconds: i64,
    pub window_seconds: i64,
    pub window_start: Option<DateTime<Utc>>,
    pub resets_at: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub exhausted: bool,
}
