//! Bearer-token authentication and the admin gate

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Validate the access token issued by the auth service
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state.jwt_service.validate_access_token(token).map_err(|e| {
        error!("Failed to validate token: {}", e);
        ApiError::Unauthorized("Invalid or expired token".to_string())
    })?;

    let revoked = state
        .jwt_service
        .is_token_blacklisted(&state.redis_pool, token)
        .await
        .map_err(ApiError::internal("Failed to check token blacklist"))?;
    if revoked {
        return Err(ApiError::Unauthorized("Token has been revoked".to_string()));
    }

    req.extensions_mut().insert(AuthUser { id: claims.sub });

    Ok(next.run(req).await)
}

/// Let through only active admins; runs after [`auth_middleware`]
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    let profile = state
        .profile_repository
        .find(user.id)
        .await
        .map_err(ApiError::internal("Failed to load profile"))?;

    match profile {
        Some(profile) if profile.is_admin && !profile.is_blocked(Utc::now()) => {
            Ok(next.run(req).await)
        }
        _ => {
            warn!("Non-admin {} tried to reach {}", user.id, req.uri().path());
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }
}
