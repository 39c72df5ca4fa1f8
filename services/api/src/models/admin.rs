//! Admin console models

use chrono::{DateTime, Utc};
use common::profiles::Profile;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Upper bound on a quota an admin may assign (one year of seconds)
pub const MAX_QUOTA_SECONDS: i64 = 365 * 24 * 3600;

/// A user joined with their profile
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub quota_limit_seconds: i64,
    pub is_admin: bool,
    pub disabled: bool,
    pub banned_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AdminUser {
    pub fn from_parts(email: String, profile: &Profile, created_at: DateTime<Utc>) -> Self {
        Self {
            id: profile.user_id,
            email,
            display_name: profile.display_name.clone(),
            quota_limit_seconds: profile.quota_limit_seconds,
            is_admin: profile.is_admin,
            disabled: profile.disabled,
            banned_until: profile.banned_until,
            created_at,
        }
    }
}

/// Query parameters for the user listing
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Case-insensitive substring of the email
    pub search: Option<String>,
}

/// Partial update of a profile by an admin; `null` clears nullable fields
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota_limit_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(
        default,
        deserialize_with = "crate::models::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub banned_until: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        deserialize_with = "crate::models::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub display_name: Option<Option<String>>,
}

impl UpdateUserRequest {
    /// Apply the update to `profile`, refusing invalid values
    ///
    /// An admin may not revoke their own admin flag nor disable or ban
    /// themselves; `acting_admin` guards that.
    pub fn apply(&self, profile: &mut Profile, acting_admin: Uuid) -> Result<(), String> {
        let is_self = profile.user_id == acting_admin;

        if let Some(quota) = self.quota_limit_seconds {
            if !(0..=MAX_QUOTA_SECONDS).contains(&quota) {
                return Err(format!(
                    "quota_limit_seconds must be between 0 and {MAX_QUOTA_SECONDS}"
                ));
            }
            profile.quota_limit_seconds = quota;
        }

        if let Some(is_admin) = self.is_admin {
            if is_self && !is_admin {
                return Err("Admins cannot remove their own admin flag".to_string());
            }
            profile.is_admin = is_admin;
        }

        if let Some(disabled) = self.disabled {
            if is_self && disabled {
                return Err("Admins cannot disable themselves".to_string());
            }
            profile.disabled = disabled;
        }

        if let Some(banned_until) = self.banned_until {
            if is_self && banned_until.is_some() {
                return Err("Admins cannot ban themselves".to_string());
            }
            profile.banned_until = banned_until;
        }

        if let Some(display_name) = &self.display_name {
            let display_name = display_name.as_deref().map(str::trim);
            validate_display_name(display_name)?;
            profile.display_name = display_name.map(str::to_string);
        }

        Ok(())
    }
}

/// Display names are optional but never blank and at most 64 characters
pub fn validate_display_name(display_name: Option<&str>) -> Result<(), String> {
    match display_name {
        Some(name) if name.trim().is_empty() => Err("Display name must not be blank".to_string()),
        Some(name) if name.chars().count() > 64 => {
            Err("Display name must be at most 64 characters long".to_string())
        }
        _ => Ok(()),
    }
}

/// Request from a user to edit their own profile
#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    pub display_name: Option<String>,
}

/// One admin action
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<String>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn profile() -> Profile {
        let now = Utc::now();
        Profile {
            user_id: Uuid::new_v4(),
            display_name: Some("Jane".to_string()),
            quota_limit_seconds: 3600,
            is_admin: false,
            disabled: false,
            banned_until: Some(now + Duration::days(1)),
            created_at: now,
            updated_at: now,
        }
    }

    fn patch(value: serde_json::Value) -> UpdateUserRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_apply_updates_only_present_fields() {
        let mut p = profile();
        patch(json!({"quota_limit_seconds": 7200, "banned_until": null}))
            .apply(&mut p, Uuid::new_v4())
            .unwrap();

        assert_eq!(p.quota_limit_seconds, 7200);
        assert_eq!(p.banned_until, None);
        assert_eq!(p.display_name.as_deref(), Some("Jane"));
        assert!(!p.disabled);
    }

    #[test]
    fn test_negative_quota_is_rejected() {
        let mut p = profile();
        let result = patch(json!({"quota_limit_seconds": -1})).apply(&mut p, Uuid::new_v4());
        assert!(result.is_err());
        assert_eq!(p.quota_limit_seconds, 3600);
    }

    #[test]
    fn test_admin_cannot_lock_themselves_out() {
        let mut p = profile();
        p.is_admin = true;
        let me = p.user_id;

        assert!(patch(json!({"is_admin": false})).apply(&mut p, me).is_err());
        assert!(patch(json!({"disabled": true})).apply(&mut p, me).is_err());
        assert!(patch(json!({"banned_until": Utc::now()})).apply(&mut p, me).is_err());
        assert!(patch(json!({"banned_until": null})).apply(&mut p, me).is_ok());
    }

    #[test]
    fn test_display_name_rules() {
        assert!(validate_display_name(None).is_ok());
        assert!(validate_display_name(Some("Jane")).is_ok());
        assert!(validate_display_name(Some("  ")).is_err());
        assert!(validate_display_name(Some(&"x".repeat(65))).is_err());
    }

    #[test]
    fn test_update_request_serializes_only_changes() {
        let details = serde_json::to_value(patch(json!({"disabled": true}))).unwrap();
        assert_eq!(details, json!({"disabled": true}));
    }
}
