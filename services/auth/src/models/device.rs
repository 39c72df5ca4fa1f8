//! Trusted device model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of a device claim: `pending -> trusted -> revoked`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Pending,
    Trusted,
    Revoked,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Pending => "pending",
            DeviceStatus::Trusted => "trusted",
            DeviceStatus::Revoked => "revoked",
        }
    }
}

impl TryFrom<String> for DeviceStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(DeviceStatus::Pending),
            "trusted" => Ok(DeviceStatus::Trusted),
            "revoked" => Ok(DeviceStatus::Revoked),
            other => Err(format!("unknown device status: {other}")),
        }
    }
}

/// Trusted device entity
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrustedDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    #[sqlx(try_from = "String")]
    pub status: DeviceStatus,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}
