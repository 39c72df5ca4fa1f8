//! Admin console handlers
//!
//! Every route here sits behind [`crate::middleware::require_admin`], and
//! every mutation appends an entry to the audit log.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, is_unique_violation},
    middleware::AuthUser,
    models::{
        Page, Pagination,
        admin::{AdminUser, AuditEntry, UpdateUserRequest, UserQuery},
        content::{
            Announcement, CreateAnnouncementRequest, CreateReleaseRequest, PutSettingRequest,
            ReleaseDetails, SiteSetting, UpdateAnnouncementRequest, UpdateReleaseRequest,
            validate_setting,
        },
    },
    state::AppState,
};

/// Append to the audit log; a failed write is logged, never surfaced
async fn audit(
    state: &AppState,
    admin: AuthUser,
    action: &str,
    target_type: &str,
    target_id: Option<&str>,
    details: serde_json::Value,
) {
    if let Err(e) = state
        .audit_repository
        .record(admin.id, action, target_type, target_id, details)
        .await
    {
        error!("Failed to write audit entry for {}: {}", action, e);
    }
}

fn duplicate_release(e: anyhow::Error) -> ApiError {
    if is_unique_violation(&e) {
        ApiError::Conflict("A release for this version and platform already exists".to_string())
    } else {
        ApiError::internal("Failed to save release")(e)
    }
}

/// List users
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Page<AdminUser>>> {
    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let (users, total) = state
        .user_directory
        .list(
            query.search.as_deref(),
            &pagination,
            state.settings.quota.default_limit_seconds,
        )
        .await
        .map_err(ApiError::internal("Failed to list users"))?;

    Ok(Json(Page::new(users, &pagination, total)))
}

async fn load_user(state: &AppState, id: Uuid) -> ApiResult<(AdminUser, common::profiles::Profile)> {
    let account = state
        .user_directory
        .find(id)
        .await
        .map_err(ApiError::internal("Failed to look up user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let profile = state
        .profile_repository
        .find_or_create(id, state.settings.quota.default_limit_seconds)
        .await
        .map_err(ApiError::internal("Failed to load profile"))?;

    Ok((
        AdminUser::from_parts(account.email, &profile, account.created_at),
        profile,
    ))
}

/// Get one user
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AdminUser>> {
    let (user, _) = load_user(&state, id).await?;
    Ok(Json(user))
}

/// Change quota, admin flag, disabled/ban state or display name
pub async fn update_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<AdminUser>> {
    let (user, mut profile) = load_user(&state, id).await?;
    payload
        .apply(&mut profile, admin.id)
        .map_err(ApiError::BadRequest)?;

    let profile = state
        .profile_repository
        .save(&profile)
        .await
        .map_err(ApiError::internal("Failed to update profile"))?;

    let details = serde_json::to_value(&payload).unwrap_or_default();
    audit(&state, admin, "user.update", "user", Some(&id.to_string()), details).await;

    Ok(Json(AdminUser::from_parts(user.email, &profile, user.created_at)))
}

/// Forget a user's usage window and history
pub async fn reset_usage(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    load_user(&state, id).await?;

    let deleted = state
        .usage_repository
        .reset(id)
        .await
        .map_err(ApiError::internal("Failed to reset usage"))?;

    audit(
        &state,
        admin,
        "user.reset_usage",
        "user",
        Some(&id.to_string()),
        json!({ "deleted_events": deleted }),
    )
    .await;

    Ok(Json(json!({ "deleted_events": deleted })))
}

/// List every announcement, including scheduled and expired ones
pub async fn list_announcements(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Announcement>>> {
    let announcements = state
        .announcement_repository
        .list()
        .await
        .map_err(ApiError::internal("Failed to list announcements"))?;

    Ok(Json(announcements))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> ApiResult<impl IntoResponse> {
    let announcement = payload
        .into_announcement(Utc::now())
        .map_err(ApiError::BadRequest)?;

    let announcement = state
        .announcement_repository
        .insert(&announcement)
        .await
        .map_err(ApiError::internal("Failed to create announcement"))?;

    audit(
        &state,
        admin,
        "announcement.create",
        "announcement",
        Some(&announcement.id.to_string()),
        json!({ "title": announcement.title, "level": announcement.level }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn update_announcement(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAnnouncementRequest>,
) -> ApiResult<Json<Announcement>> {
    let mut announcement = state
        .announcement_repository
        .find(id)
        .await
        .map_err(ApiError::internal("Failed to look up announcement"))?
        .ok_or_else(|| ApiError::NotFound("Announcement not found".to_string()))?;

    announcement.apply(payload);
    announcement.validate().map_err(ApiError::BadRequest)?;

    let announcement = state
        .announcement_repository
        .save(&announcement)
        .await
        .map_err(ApiError::internal("Failed to update announcement"))?;

    audit(
        &state,
        admin,
        "announcement.update",
        "announcement",
        Some(&id.to_string()),
        json!({ "title": announcement.title }),
    )
    .await;

    Ok(Json(announcement))
}

pub async fn delete_announcement(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = state
        .announcement_repository
        .delete(id)
        .await
        .map_err(ApiError::internal("Failed to delete announcement"))?;

    if !deleted {
        return Err(ApiError::NotFound("Announcement not found".to_string()));
    }

    audit(
        &state,
        admin,
        "announcement.delete",
        "announcement",
        Some(&id.to_string()),
        json!({}),
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_settings(State(state): State<AppState>) -> ApiResult<Json<Vec<SiteSetting>>> {
    let settings = state
        .settings_repository
        .all()
        .await
        .map_err(ApiError::internal("Failed to list settings"))?;

    Ok(Json(settings))
}

pub async fn put_setting(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(key): Path<String>,
    Json(payload): Json<PutSettingRequest>,
) -> ApiResult<Json<SiteSetting>> {
    validate_setting(&key, &payload.value).map_err(ApiError::BadRequest)?;

    let setting = state
        .settings_repository
        .put(&key, &payload.value)
        .await
        .map_err(ApiError::internal("Failed to save setting"))?;

    audit(
        &state,
        admin,
        "setting.put",
        "setting",
        Some(&key),
        json!({ "value": setting.value }),
    )
    .await;

    Ok(Json(setting))
}

pub async fn delete_setting(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    let deleted = state
        .settings_repository
        .delete(&key)
        .await
        .map_err(ApiError::internal("Failed to delete setting"))?;

    if !deleted {
        return Err(ApiError::NotFound("Setting not found".to_string()));
    }

    audit(&state, admin, "setting.delete", "setting", Some(&key), json!({})).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_releases(State(state): State<AppState>) -> ApiResult<Json<Vec<ReleaseDetails>>> {
    let releases = state
        .release_repository
        .list()
        .await
        .map_err(ApiError::internal("Failed to list releases"))?;

    Ok(Json(releases.into_iter().map(ReleaseDetails::from).collect()))
}

pub async fn create_release(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Json(payload): Json<CreateReleaseRequest>,
) -> ApiResult<impl IntoResponse> {
    let release = payload
        .into_release(Utc::now())
        .map_err(ApiError::BadRequest)?;

    let release = state
        .release_repository
        .insert(&release)
        .await
        .map_err(duplicate_release)?;

    audit(
        &state,
        admin,
        "release.create",
        "release",
        Some(&release.id.to_string()),
        json!({
            "version": release.version,
            "platform": release.platform,
            "published": release.published,
        }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(ReleaseDetails::from(release))))
}

pub async fn update_release(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReleaseRequest>,
) -> ApiResult<Json<ReleaseDetails>> {
    let mut release = state
        .release_repository
        .find(id)
        .await
        .map_err(ApiError::internal("Failed to look up release"))?
        .ok_or_else(|| ApiError::NotFound("Release not found".to_string()))?;

    release.apply(payload);
    release.validate().map_err(ApiError::BadRequest)?;

    let release = state
        .release_repository
        .save(&release)
        .await
        .map_err(duplicate_release)?;

    audit(
        &state,
        admin,
        "release.update",
        "release",
        Some(&id.to_string()),
        json!({
            "version": release.version,
            "platform": release.platform,
            "published": release.published,
        }),
    )
    .await;

    Ok(Json(ReleaseDetails::from(release)))
}

pub async fn delete_release(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let deleted = state
        .release_repository
        .delete(id)
        .await
        .map_err(ApiError::internal("Failed to delete release"))?;

    if !deleted {
        return Err(ApiError::NotFound("Release not found".to_string()));
    }

    audit(&state, admin, "release.delete", "release", Some(&id.to_string()), json!({})).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_audit(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Page<AuditEntry>>> {
    let (entries, total) = state
        .audit_repository
        .list(&pagination)
        .await
        .map_err(ApiError::internal("Failed to list audit log"))?;

    Ok(Json(Page::new(entries, &pagination, total)))
}
