//! Announcements, site settings and software releases

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Setting key that switches downloads off
pub const SOFTWARE_LOCKED: &str = "software_locked";
/// Setting key holding the message shown while locked
pub const LOCK_MESSAGE: &str = "lock_message";
/// Setting key selecting windowed (true) or lifetime (false) accounting
pub const USAGE_WINDOW_ENABLED: &str = "usage_window_enabled";

fn require_text(field: &str, value: &str, max_chars: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be blank"));
    }
    if value.chars().count() > max_chars {
        return Err(format!("{field} must be at most {max_chars} characters long"));
    }
    Ok(())
}

/// Announcement severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementLevel {
    Info,
    Warning,
    Critical,
}

impl AnnouncementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementLevel::Info => "info",
            AnnouncementLevel::Warning => "warning",
            AnnouncementLevel::Critical => "critical",
        }
    }
}

impl TryFrom<String> for AnnouncementLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "info" => Ok(AnnouncementLevel::Info),
            "warning" => Ok(AnnouncementLevel::Warning),
            "critical" => Ok(AnnouncementLevel::Critical),
            other => Err(format!("unknown announcement level: {other}")),
        }
    }
}

/// Site-wide announcement
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    #[sqlx(try_from = "String")]
    pub level: AnnouncementLevel,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Announcement {
    /// Visible from `starts_at` up to, not including, `ends_at`
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && self.ends_at.is_none_or(|ends_at| now < ends_at)
    }

    /// Check the invariants enforced on every write
    pub fn validate(&self) -> Result<(), String> {
        require_text("Title", &self.title, 200)?;
        require_text("Body", &self.body, 5000)?;
        if self.ends_at.is_some_and(|ends_at| ends_at <= self.starts_at) {
            return Err("ends_at must be after starts_at".to_string());
        }
        Ok(())
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: UpdateAnnouncementRequest) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(level) = patch.level {
            self.level = level;
        }
        if let Some(starts_at) = patch.starts_at {
            self.starts_at = starts_at;
        }
        if let Some(ends_at) = patch.ends_at {
            self.ends_at = ends_at;
        }
    }
}

/// Request to create an announcement
#[derive(Debug, Deserialize)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub body: String,
    pub level: Option<AnnouncementLevel>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl CreateAnnouncementRequest {
    /// Turn the request into a validated announcement starting at `now` by default
    pub fn into_announcement(self, now: DateTime<Utc>) -> Result<Announcement, String> {
        let announcement = Announcement {
            id: Uuid::new_v4(),
            title: self.title.trim().to_string(),
            body: self.body,
            level: self.level.unwrap_or(AnnouncementLevel::Info),
            starts_at: self.starts_at.unwrap_or(now),
            ends_at: self.ends_at,
            created_at: now,
            updated_at: now,
        };
        announcement.validate()?;
        Ok(announcement)
    }
}

/// Partial update of an announcement; `"ends_at": null` clears the end
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub level: Option<AnnouncementLevel>,
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
}

/// Key/value site setting
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SiteSetting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Request to set a site setting
#[derive(Debug, Deserialize)]
pub struct PutSettingRequest {
    pub value: serde_json::Value,
}

/// Check a setting key and, for well-known keys, the value's type
pub fn validate_setting(key: &str, value: &serde_json::Value) -> Result<(), String> {
    static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = KEY_REGEX
        .get_or_init(|| Regex::new(r"^[a-z][a-z0-9_]{0,63}$").expect("Failed to compile key regex"));

    if !regex.is_match(key) {
        return Err("Setting keys are lowercase letters, digits and underscores".to_string());
    }

    match key {
        SOFTWARE_LOCKED | USAGE_WINDOW_ENABLED if !value.is_boolean() => {
            Err(format!("{key} must be a boolean"))
        }
        LOCK_MESSAGE if !value.is_string() => Err(format!("{key} must be a string")),
        _ if value.is_null() => Err("Setting value must not be null".to_string()),
        _ => Ok(()),
    }
}

/// Flags read from site settings on every gated request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortalFlags {
    pub software_locked: bool,
    pub lock_message: Option<String>,
    pub usage_window_enabled: bool,
}

impl Default for PortalFlags {
    fn default() -> Self {
        Self {
            software_locked: false,
            lock_message: None,
            usage_window_enabled: true,
        }
    }
}

impl PortalFlags {
    /// Fold settings rows over the defaults; unknown keys and mistyped values are ignored
    pub fn from_settings(settings: &[SiteSetting]) -> Self {
        let mut flags = Self::default();
        for setting in settings {
            match (setting.key.as_str(), &setting.value) {
                (SOFTWARE_LOCKED, serde_json::Value::Bool(locked)) => {
                    flags.software_locked = *locked
                }
                (USAGE_WINDOW_ENABLED, serde_json::Value::Bool(enabled)) => {
                    flags.usage_window_enabled = *enabled
                }
                (LOCK_MESSAGE, serde_json::Value::String(message)) => {
                    flags.lock_message = Some(message.clone())
                }
                _ => {}
            }
        }
        flags
    }
}

/// Downloadable build of the desktop utility
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SoftwareRelease {
    pub id: Uuid,
    pub version: String,
    pub platform: String,
    #[serde(skip_serializing)]
    pub storage_key: String,
    pub notes: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin view of a release, including where it is stored
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseDetails {
    #[serde(flatten)]
    pub release: SoftwareRelease,
    pub storage_key: String,
}

impl From<SoftwareRelease> for ReleaseDetails {
    fn from(release: SoftwareRelease) -> Self {
        let storage_key = release.storage_key.clone();
        Self {
            release,
            storage_key,
        }
    }
}

impl SoftwareRelease {
    /// Check the invariants enforced on every write
    pub fn validate(&self) -> Result<(), String> {
        require_text("Version", &self.version, 32)?;
        validate_platform(&self.platform)?;
        require_text("Storage key", &self.storage_key, 512)?;
        if let Some(notes) = &self.notes {
            require_text("Notes", notes, 10_000)?;
        }
        Ok(())
    }

    /// Apply a partial update
    pub fn apply(&mut self, patch: UpdateReleaseRequest) {
        if let Some(version) = patch.version {
            self.version = version.trim().to_string();
        }
        if let Some(platform) = patch.platform {
            self.platform = platform;
        }
        if let Some(storage_key) = patch.storage_key {
            self.storage_key = storage_key;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(published) = patch.published {
            self.published = published;
        }
    }
}

/// Platform names are short lowercase slugs such as `windows` or `macos-arm64`
pub fn validate_platform(platform: &str) -> Result<(), String> {
    static PLATFORM_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = PLATFORM_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_-]{0,31}$").expect("Failed to compile platform regex")
    });

    if !regex.is_match(platform) {
        return Err("Invalid platform".to_string());
    }
    Ok(())
}

/// Request to register a release
#[derive(Debug, Deserialize)]
pub struct CreateReleaseRequest {
    pub version: String,
    pub platform: String,
    pub storage_key: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub published: bool,
}

impl CreateReleaseRequest {
    pub fn into_release(self, now: DateTime<Utc>) -> Result<SoftwareRelease, String> {
        let release = SoftwareRelease {
            id: Uuid::new_v4(),
            version: self.version.trim().to_string(),
            platform: self.platform,
            storage_key: self.storage_key,
            notes: self.notes,
            published: self.published,
            created_at: now,
            updated_at: now,
        };
        release.validate()?;
        Ok(release)
    }
}

/// Partial update of a release; `"notes": null` clears the notes
#[derive(Debug, Default, Deserialize)]
pub struct UpdateReleaseRequest {
    pub version: Option<String>,
    pub platform: Option<String>,
    pub storage_key: Option<String>,
    #[serde(default, deserialize_with = "crate::models::double_option")]
    pub notes: Option<Option<String>>,
    pub published: Option<bool>,
}

/// Request to download the latest build for a platform
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub platform: String,
}

/// Presigned download link
#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
    pub version: String,
    pub platform: String,
    pub expires_at: DateTime<Utc>,
}

/// Public site status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub software_locked: bool,
    pub lock_message: Option<String>,
    pub releases: Vec<SoftwareRelease>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn announcement(now: DateTime<Utc>) -> Announcement {
        CreateAnnouncementRequest {
            title: "Maintenance".to_string(),
            body: "Downloads pause tonight".to_string(),
            level: None,
            starts_at: None,
            ends_at: Some(now + Duration::hours(2)),
        }
        .into_announcement(now)
        .unwrap()
    }

    #[test]
    fn test_announcement_visibility_window_is_half_open() {
        let now = Utc::now();
        let a = announcement(now);

        assert!(a.is_visible(now));
        assert!(a.is_visible(now + Duration::minutes(119)));
        assert!(!a.is_visible(now + Duration::hours(2)));
        assert!(!a.is_visible(now - Duration::seconds(1)));
    }

    #[test]
    fn test_open_ended_announcement_stays_visible() {
        let now = Utc::now();
        let mut a = announcement(now);
        a.apply(serde_json::from_value(json!({"ends_at": null})).unwrap());

        assert_eq!(a.ends_at, None);
        assert!(a.is_visible(now + Duration::days(365)));
    }

    #[test]
    fn test_absent_ends_at_leaves_end_untouched() {
        let now = Utc::now();
        let mut a = announcement(now);
        let before = a.ends_at;
        a.apply(serde_json::from_value(json!({"title": "Updated"})).unwrap());

        assert_eq!(a.title, "Updated");
        assert_eq!(a.ends_at, before);
    }

    #[test]
    fn test_announcement_must_end_after_it_starts() {
        let now = Utc::now();
        let result = CreateAnnouncementRequest {
            title: "Oops".to_string(),
            body: "Body".to_string(),
            level: Some(AnnouncementLevel::Warning),
            starts_at: Some(now),
            ends_at: Some(now),
        }
        .into_announcement(now);

        assert!(result.is_err());
    }

    #[test]
    fn test_blank_title_is_rejected() {
        let now = Utc::now();
        let mut a = announcement(now);
        a.title = "   ".to_string();
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_well_known_settings_are_type_checked() {
        assert!(validate_setting(SOFTWARE_LOCKED, &json!(true)).is_ok());
        assert!(validate_setting(SOFTWARE_LOCKED, &json!("yes")).is_err());
        assert!(validate_setting(LOCK_MESSAGE, &json!("Back soon")).is_ok());
        assert!(validate_setting(LOCK_MESSAGE, &json!(1)).is_err());
        assert!(validate_setting("support_email", &json!("help@example.com")).is_ok());
        assert!(validate_setting("support_email", &json!(null)).is_err());
        assert!(validate_setting("Bad-Key", &json!(1)).is_err());
    }

    #[test]
    fn test_portal_flags_fold_over_defaults() {
        let now = Utc::now();
        let setting = |key: &str, value: serde_json::Value| SiteSetting {
            key: key.to_string(),
            value,
            updated_at: now,
        };

        assert_eq!(PortalFlags::from_settings(&[]), PortalFlags::default());

        let flags = PortalFlags::from_settings(&[
            setting(SOFTWARE_LOCKED, json!(true)),
            setting(LOCK_MESSAGE, json!("Back soon")),
            setting(USAGE_WINDOW_ENABLED, json!("not a bool")),
        ]);
        assert!(flags.software_locked);
        assert_eq!(flags.lock_message.as_deref(), Some("Back soon"));
        assert!(flags.usage_window_enabled);
    }

    #[test]
    fn test_release_validation() {
        let now = Utc::now();
        let request = |platform: &str| CreateReleaseRequest {
            version: " 1.4.0 ".to_string(),
            platform: platform.to_string(),
            storage_key: "releases/1.4.0/setup.exe".to_string(),
            notes: None,
            published: true,
        };

        let release = request("windows").into_release(now).unwrap();
        assert_eq!(release.version, "1.4.0");
        assert!(request("Windows 11").into_release(now).is_err());
    }

    #[test]
    fn test_release_serialization_hides_storage_key() {
        let release = CreateReleaseRequest {
            version: "1.0.0".to_string(),
            platform: "linux".to_string(),
            storage_key: "releases/1.0.0/app.tar.gz".to_string(),
            notes: None,
            published: false,
        }
        .into_release(Utc::now())
        .unwrap();

        let public = serde_json::to_value(&release).unwrap();
        assert!(public.get("storage_key").is_none());

        let details = serde_json::to_value(ReleaseDetails::from(release)).unwrap();
        assert_eq!(details["storage_key"], "releases/1.0.0/app.tar.gz");
        assert_eq!(details["platform"], "linux");
    }
}
