//! Download gate
//!
//! A download is admitted only for an active profile, while the software is
//! not locked, and while the caller has usage left. Each admitted download is
//! logged as a zero-second usage event; consumption itself is metered by
//! recorded sessions.

use axum::{Extension, Json, extract::State};
use chrono::{DateTime, Utc};
use common::profiles::Profile;
use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::content::{DownloadRequest, DownloadResponse, PortalFlags, validate_platform},
    state::AppState,
    usage::{Consumption, lifetime_consumption, windowed_consumption},
};

/// Reject blocked accounts, then a locked site
pub fn check_access(profile: &Profile, flags: &PortalFlags, now: DateTime<Utc>) -> ApiResult<()> {
    if profile.is_blocked(now) {
        return Err(ApiError::Forbidden("Account is disabled".to_string()));
    }

    if flags.software_locked {
        return Err(ApiError::SoftwareLocked(
            flags
                .lock_message
                .clone()
                .unwrap_or_else(|| "Downloads are temporarily unavailable".to_string()),
        ));
    }

    Ok(())
}

/// Reject once usage has reached the limit
pub fn check_quota(consumption: &Consumption) -> ApiResult<()> {
    if consumption.exhausted() {
        return Err(ApiError::QuotaExceeded);
    }
    Ok(())
}

/// Admit a download and hand out a presigned link to the latest published build
pub async fn request_download(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    validate_platform(&payload.platform).map_err(ApiError::BadRequest)?;

    let quota = state.settings.quota;
    let now = Utc::now();

    let profile = state
        .profile_repository
        .find_or_create(user.id, quota.default_limit_seconds)
        .await
        .map_err(ApiError::internal("Failed to load profile"))?;

    let settings = state
        .settings_repository
        .all()
        .await
        .map_err(ApiError::internal("Failed to load site settings"))?;
    let flags = PortalFlags::from_settings(&settings);

    check_access(&profile, &flags, now)?;

    let consumption = if flags.usage_window_enabled {
        let window = state
            .usage_repository
            .find_window(user.id)
            .await
            .map_err(ApiError::internal("Failed to load usage window"))?;
        windowed_consumption(window.as_ref(), profile.quota_limit_seconds, &quota, now)
    } else {
        let total = state
            .usage_repository
            .total_seconds(user.id)
            .await
            .map_err(ApiError::internal("Failed to sum usage"))?;
        lifetime_consumption(total, profile.quota_limit_seconds)
    };

    if let Err(e) = check_quota(&consumption) {
        warn!(
            "Download refused for {}: {}s used of {}s",
            user.id, consumption.used, consumption.limit
        );
        return Err(e);
    }

    let release = state
        .release_repository
        .latest_published(&payload.platform)
        .await
        .map_err(ApiError::internal("Failed to look up release"))?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No release available for {}", payload.platform))
        })?;

    state
        .usage_repository
        .record_download(user.id, now)
        .await
        .map_err(ApiError::internal("Failed to record download"))?;

    let download = state
        .storage
        .presign_download(&release.storage_key)
        .await
        .map_err(ApiError::internal("Failed to presign download"))?;

    info!(
        "Issued download of {} {} to {}",
        release.platform, release.version, user.id
    );

    Ok(Json(DownloadResponse {
        url: download.url,
        version: release.version,
        platform: release.platform,
        expires_at: download.expires_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};
    use chrono::Duration;
    use uuid::Uuid;

    fn profile() -> Profile {
        let now = Utc::now();
        Profile {
            user_id: Uuid::new_v4(),
            display_name: None,
            quota_limit_seconds: 3600,
            is_admin: false,
            disabled: false,
            banned_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn status(result: ApiResult<()>) -> StatusCode {
        match result {
            Ok(()) => StatusCode::OK,
            Err(e) => e.into_response().status(),
        }
    }

    #[test]
    fn test_active_profile_on_open_site_is_admitted() {
        assert!(check_access(&profile(), &PortalFlags::default(), Utc::now()).is_ok());
    }

    #[test]
    fn test_disabled_or_banned_profile_is_forbidden() {
        let now = Utc::now();
        let mut p = profile();
        p.disabled = true;
        assert_eq!(status(check_access(&p, &PortalFlags::default(), now)), StatusCode::FORBIDDEN);

        let mut p = profile();
        p.banned_until = Some(now + Duration::hours(1));
        assert_eq!(status(check_access(&p, &PortalFlags::default(), now)), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_blocked_profile_is_reported_before_lock() {
        let mut p = profile();
        p.disabled = true;
        let flags = PortalFlags {
            software_locked: true,
            ..PortalFlags::default()
        };
        assert_eq!(status(check_access(&p, &flags, Utc::now())), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_locked_site_is_unavailable_with_message() {
        let flags = PortalFlags {
            software_locked: true,
            lock_message: Some("Back at 18:00".to_string()),
            usage_window_enabled: true,
        };

        match check_access(&profile(), &flags, Utc::now()) {
            Err(ApiError::SoftwareLocked(message)) => assert_eq!(message, "Back at 18:00"),
            other => panic!("expected lock, got {other:?}"),
        }
    }

    #[test]
    fn test_quota_rejects_at_limit_and_admits_below() {
        assert!(check_quota(&Consumption { used: 3599, limit: 3600 }).is_ok());
        assert!(matches!(
            check_quota(&Consumption { used: 3600, limit: 3600 }),
            Err(ApiError::QuotaExceeded)
        ));
    }
}
