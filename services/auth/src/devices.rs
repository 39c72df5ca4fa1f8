//! Device trust: the step-up bypass for browsers that completed verification
//!
//! A device claim is created `pending` with a random device id and a random
//! bearer token, of which only the SHA-256 is stored. The token travels by
//! email; presenting it before the pending claim expires promotes the claim
//! to `trusted` for [`TRUST_DAYS`] and sets the `trusted_device` cookie
//! (`<device_id>.<token>`). Revocation is terminal.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use common::hashing::{matches_hash, sha256_hex};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    mailer::Email,
    middleware::AuthUser,
    models::{DeviceStatus, TrustedDevice},
    state::AppState,
    validation::validate_label,
};

/// Name of the device trust cookie
pub const DEVICE_COOKIE: &str = "trusted_device";
/// How long an emailed verification link stays valid
pub const PENDING_TTL_MINUTES: i64 = 60;
/// How long a confirmed device stays trusted
pub const TRUST_DAYS: i64 = 30;

/// Why a confirmation was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfirmError {
    #[error("Verification token does not match")]
    TokenMismatch,
    #[error("Device is not awaiting verification")]
    NotPending,
    #[error("Verification link has expired")]
    Expired,
}

/// Decide whether `token` may promote `device` to trusted at `now`.
///
/// The token is checked first so a caller holding only a device id learns
/// nothing about the claim's state.
pub fn check_confirmation(
    device: &TrustedDevice,
    token: &str,
    now: DateTime<Utc>,
) -> Result<(), ConfirmError> {
    if !matches_hash(token, &device.token_hash) {
        return Err(ConfirmError::TokenMismatch);
    }
    if device.status != DeviceStatus::Pending {
        return Err(ConfirmError::NotPending);
    }
    if now >= device.expires_at {
        return Err(ConfirmError::Expired);
    }
    Ok(())
}

/// Whether `device` currently vouches for `user_id` given the cookie token
pub fn is_trusted(device: &TrustedDevice, user_id: Uuid, token: &str, now: DateTime<Utc>) -> bool {
    device.user_id == user_id
        && device.status == DeviceStatus::Trusted
        && now < device.expires_at
        && matches_hash(token, &device.token_hash)
}

/// Parsed `trusted_device` cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCookie {
    pub device_id: String,
    pub token: String,
}

impl DeviceCookie {
    pub fn parse(value: &str) -> Option<Self> {
        let (device_id, token) = value.split_once('.')?;
        if device_id.is_empty() || token.is_empty() {
            return None;
        }
        Some(Self {
            device_id: device_id.to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_jar(jar: &CookieJar) -> Option<Self> {
        jar.get(DEVICE_COOKIE).and_then(|c| Self::parse(c.value()))
    }

    pub fn value(&self) -> String {
        format!("{}.{}", self.device_id, self.token)
    }
}

fn trust_cookie(device_cookie: &DeviceCookie) -> Cookie<'static> {
    Cookie::build((DEVICE_COOKIE, device_cookie.value()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(TRUST_DAYS))
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build(DEVICE_COOKIE).path("/").build()
}

fn generate_device_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn generate_device_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Resolve the cookie's device if it vouches for `user_id`, refreshing its last-seen time
pub async fn trusted_device_for(
    state: &AppState,
    jar: &CookieJar,
    user_id: Uuid,
) -> AuthResult<Option<TrustedDevice>> {
    let Some(cookie) = DeviceCookie::from_jar(jar) else {
        return Ok(None);
    };

    let device = state
        .device_repository
        .find_by_device_id(&cookie.device_id)
        .await
        .map_err(AuthError::internal("Failed to look up device"))?;

    match device {
        Some(device) if is_trusted(&device, user_id, &cookie.token, Utc::now()) => {
            state
                .device_repository
                .touch(device.id)
                .await
                .map_err(AuthError::internal("Failed to update device"))?;
            Ok(Some(device))
        }
        _ => Ok(None),
    }
}

/// Request to trust the current device
#[derive(Debug, Deserialize, Default)]
pub struct CreateDeviceRequest {
    pub label: Option<String>,
}

/// Request to confirm a device from the emailed link
#[derive(Debug, Deserialize)]
pub struct ConfirmDeviceRequest {
    pub device_id: String,
    pub token: String,
}

/// Response for the device check
#[derive(Debug, Serialize)]
pub struct DeviceCheckResponse {
    pub trusted: bool,
    pub device: Option<TrustedDevice>,
}

/// Create a pending device claim and email its verification link
pub async fn create_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateDeviceRequest>,
) -> AuthResult<impl IntoResponse> {
    let label = payload.label.as_deref().map(str::trim);
    validate_label("Label", label).map_err(AuthError::BadRequest)?;

    let account = state
        .user_repository
        .find_by_id(user.id)
        .await
        .map_err(AuthError::internal("Failed to find user"))?
        .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

    let device_cookie = DeviceCookie {
        device_id: generate_device_id(),
        token: generate_device_token(),
    };
    let expires_at = Utc::now() + Duration::minutes(PENDING_TTL_MINUTES);

    let device = state
        .device_repository
        .create_pending(
            user.id,
            &device_cookie.device_id,
            &sha256_hex(&device_cookie.token),
            label,
            expires_at,
        )
        .await
        .map_err(AuthError::internal("Failed to create device"))?;

    let link = format!(
        "{}/devices/confirm?device_id={}&token={}",
        state.settings.site_url.trim_end_matches('/'),
        device_cookie.device_id,
        device_cookie.token
    );
    state
        .mailer
        .send(&Email::device_verification(&account.email, &link, label))
        .await
        .map_err(AuthError::internal("Failed to send device verification"))?;

    info!("Created pending device {} for user {}", device.id, user.id);
    Ok((StatusCode::CREATED, Json(device)))
}

/// Promote a pending device to trusted and hand the browser its cookie
pub async fn confirm_device(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ConfirmDeviceRequest>,
) -> AuthResult<impl IntoResponse> {
    if payload.device_id.is_empty() || payload.token.is_empty() {
        return Err(AuthError::BadRequest(
            "device_id and token are required".to_string(),
        ));
    }

    let device = state
        .device_repository
        .find_by_device_id(&payload.device_id)
        .await
        .map_err(AuthError::internal("Failed to look up device"))?
        .ok_or_else(|| AuthError::NotFound("Device not found".to_string()))?;

    check_confirmation(&device, &payload.token, Utc::now()).map_err(|e| {
        warn!("Rejected confirmation of device {}: {}", device.id, e);
        match e {
            ConfirmError::TokenMismatch => AuthError::Forbidden(e.to_string()),
            ConfirmError::NotPending => AuthError::Conflict(e.to_string()),
            ConfirmError::Expired => AuthError::BadRequest(e.to_string()),
        }
    })?;

    let device = state
        .device_repository
        .mark_trusted(device.id, Utc::now() + Duration::days(TRUST_DAYS))
        .await
        .map_err(AuthError::internal("Failed to trust device"))?
        .ok_or_else(|| AuthError::Conflict(ConfirmError::NotPending.to_string()))?;

    info!("Device {} is now trusted", device.id);

    let jar = jar.add(trust_cookie(&DeviceCookie {
        device_id: payload.device_id,
        token: payload.token,
    }));
    Ok((jar, Json(device)))
}

/// Report whether the browser's cookie vouches for the caller
pub async fn check_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> AuthResult<Json<DeviceCheckResponse>> {
    let device = trusted_device_for(&state, &jar, user.id).await?;

    Ok(Json(DeviceCheckResponse {
        trusted: device.is_some(),
        device,
    }))
}

/// List the caller's devices
pub async fn list_devices(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AuthResult<Json<Vec<TrustedDevice>>> {
    let devices = state
        .device_repository
        .list_for_user(user.id)
        .await
        .map_err(AuthError::internal("Failed to list devices"))?;

    Ok(Json(devices))
}

/// Revoke one of the caller's devices
pub async fn revoke_device(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> AuthResult<impl IntoResponse> {
    let device = state
        .device_repository
        .revoke(id, user.id)
        .await
        .map_err(AuthError::internal("Failed to revoke device"))?
        .ok_or_else(|| AuthError::NotFound("Device not found".to_string()))?;

    info!("Revoked device {} of user {}", device.id, user.id);

    let names_this_device = DeviceCookie::from_jar(&jar)
        .is_some_and(|cookie| cookie.device_id == device.device_id);
    let jar = if names_this_device {
        jar.remove(removal_cookie())
    } else {
        jar
    };

    Ok((jar, Json(device)))
}
