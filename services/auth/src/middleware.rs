//! Middleware for JWT token validation and authentication

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use tracing::error;
use uuid::Uuid;

use crate::{error::AuthError, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Pull the token out of an `Authorization: Bearer <token>` header
pub fn bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

/// Extract and validate the access token, then expose [`AuthUser`] to handlers
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AuthError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = state.jwt_service.validate_access_token(token).map_err(|e| {
        error!("Failed to validate token: {}", e);
        AuthError::Unauthorized("Invalid or expired token".to_string())
    })?;

    let is_blacklisted = state
        .jwt_service
        .is_token_blacklisted(&state.redis_pool, token)
        .await
        .map_err(AuthError::internal("Failed to check if token is blacklisted"))?;

    if is_blacklisted {
        return Err(AuthError::Unauthorized("Token has been revoked".to_string()));
    }

    req.extensions_mut().insert(AuthUser { id: claims.sub });

    Ok(next.run(req).await)
}
