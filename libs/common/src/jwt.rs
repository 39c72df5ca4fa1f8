//! JWT service for token generation, validation, and management
//!
//! Tokens are signed with RS256. The auth service holds the private key and
//! issues tokens; every other service only needs the public key to verify
//! them. Refresh tokens are rotated, and revoked tokens are blacklisted in
//! Redis by their SHA-256 digest for the rest of their lifetime.

use anyhow::Result;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::{cache::RedisPool, hashing::sha256_hex};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Private key for signing tokens; absent in verify-only services
    pub private_key: Option<String>,
    /// Public key for verifying tokens
    pub public_key: String,
    /// Access token expiration time in seconds (default: 15 minutes)
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds (default: 7 days)
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY`: Private key (PEM) or path to it; optional
    /// - `JWT_PUBLIC_KEY`: Public key (PEM) or path to it
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 900)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let private_key = match std::env::var("JWT_PRIVATE_KEY") {
            Ok(value) => Some(read_pem(&value, "private")?),
            Err(_) => None,
        };

        let public_key = std::env::var("JWT_PUBLIC_KEY")
            .map_err(|_| anyhow::anyhow!("JWT_PUBLIC_KEY environment variable not set"))?;
        let public_key = read_pem(&public_key, "public")?;

        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(900);

        let refresh_token_expiry = std::env::var("JWT_REFRESH_TOKEN_EXPIRY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(604800);

        Ok(JwtConfig {
            private_key,
            public_key,
            access_token_expiry,
            refresh_token_expiry,
        })
    }
}

/// Accept either inline PEM or a path to a PEM file (CWD first, then crate root)
fn read_pem(value: &str, kind: &str) -> Result<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    let contents = std::fs::read_to_string(value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(value);
            std::fs::read_to_string(path)
        })
        .map_err(|e| anyhow::anyhow!("Failed to read {} key file: {}", kind, e))?;

    Ok(contents.trim().to_string())
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token type (access or refresh)
    pub token_type: TokenType,
    /// Unique token id, so two tokens minted in the same second differ
    pub jti: Uuid,
}

/// Token type enum
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    /// Access token
    Access,
    /// Refresh token
    Refresh,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Option<EncodingKey>,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        let encoding_key = config
            .private_key
            .as_deref()
            .map(|pem| EncodingKey::from_rsa_pem(pem.as_bytes()))
            .transpose()?;
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key.as_bytes())?;
        let mut validation = Validation::new(jsonwebtoken::Algorithm::RS256);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    fn issue(&self, user_id: Uuid, token_type: TokenType, lifetime: u64) -> Result<String> {
        let encoding_key = self
            .encoding_key
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("JWT service has no signing key"))?;

        let now = unix_now()?;
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + lifetime,
            token_type,
            jti: Uuid::new_v4(),
        };

        let token = encode(
            &Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            encoding_key,
        )?;
        Ok(token)
    }

    /// Generate an access token for a user
    pub fn generate_access_token(&self, user_id: Uuid) -> Result<String> {
        self.issue(user_id, TokenType::Access, self.config.access_token_expiry)
    }

    /// Generate a refresh token for a user
    pub fn generate_refresh_token(&self, user_id: Uuid) -> Result<String> {
        self.issue(user_id, TokenType::Refresh, self.config.refresh_token_expiry)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Validate a token and require it to be an access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Access {
            anyhow::bail!("Token is not an access token");
        }
        Ok(claims)
    }

    /// Check if a token is blacklisted in Redis
    pub async fn is_token_blacklisted(&self, redis_pool: &RedisPool, token: &str) -> Result<bool> {
        let result = redis_pool.get(&blacklist_key(token)).await?;
        Ok(result.is_some())
    }

    /// Blacklist a token in Redis for `expiry` seconds
    pub async fn blacklist_token(
        &self,
        redis_pool: &RedisPool,
        token: &str,
        expiry: u64,
    ) -> Result<()> {
        // SETEX rejects a zero TTL
        redis_pool
            .set(&blacklist_key(token), "1", Some(expiry.max(1)))
            .await
    }

    /// Blacklist a token until its own expiry
    pub async fn revoke(&self, redis_pool: &RedisPool, token: &str, claims: &Claims) -> Result<()> {
        let remaining = claims.exp.saturating_sub(unix_now()?);
        self.blacklist_token(redis_pool, token, remaining).await
    }

    /// Get the access token expiry time
    pub fn access_token_expiry(&self) -> u64 {
        self.config.access_token_expiry
    }

    /// Get the refresh token expiry time
    pub fn refresh_token_expiry(&self) -> u64 {
        self.config.refresh_token_expiry
    }

    /// Rotate a refresh token
    ///
    /// Blacklists the old refresh token for its remaining lifetime and
    /// returns a new one for the same user.
    pub async fn rotate_refresh_token(
        &self,
        redis_pool: &RedisPool,
        old_refresh_token: &str,
    ) -> Result<(Uuid, String)> {
        let claims = self.validate_token(old_refresh_token)?;

        if claims.token_type != TokenType::Refresh {
            anyhow::bail!("Token is not a refresh token");
        }

        if self.is_token_blacklisted(redis_pool, old_refresh_token).await? {
            anyhow::bail!("Refresh token has been revoked");
        }

        self.revoke(redis_pool, old_refresh_token, &claims).await?;

        let new_refresh_token = self.generate_refresh_token(claims.sub)?;
        Ok((claims.sub, new_refresh_token))
    }
}

fn blacklist_key(token: &str) -> String {
    format!("blacklisted_token:{}", sha256_hex(token))
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
        .as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &str = include_str!("../test-fixtures/jwt_private.pem");
    const PUBLIC_KEY: &str = include_str!("../test-fixtures/jwt_public.pem");

    fn signing_service() -> JwtService {
        JwtService::new(JwtConfig {
            private_key: Some(PRIVATE_KEY.to_string()),
            public_key: PUBLIC_KEY.to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        })
        .expect("fixture keys should load")
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = signing_service();
        let user_id = Uuid::new_v4();

        let token = service.generate_access_token(user_id).unwrap();
        let claims = service.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_refresh_token_is_not_an_access_token() {
        let service = signing_service();
        let token = service.generate_refresh_token(Uuid::new_v4()).unwrap();

        assert!(service.validate_token(&token).is_ok());
        assert!(service.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_tampered_token_is_rejected() {
        let service = signing_service();
        let token = service.generate_access_token(Uuid::new_v4()).unwrap();
        let mut tampered = token.clone();
        tampered.pop();
        tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

        assert!(service.validate_token(&tampered).is_err());
    }

    #[test]
    fn test_verify_only_service_cannot_issue() {
        let service = JwtService::new(JwtConfig {
            private_key: None,
            public_key: PUBLIC_KEY.to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        })
        .unwrap();

        assert!(service.generate_access_token(Uuid::new_v4()).is_err());

        let token = signing_service()
            .generate_access_token(Uuid::new_v4())
            .unwrap();
        assert!(service.validate_access_token(&token).is_ok());
    }

    #[test]
    fn test_tokens_minted_together_differ() {
        let service = signing_service();
        let user_id = Uuid::new_v4();
        let a = service.generate_refresh_token(user_id).unwrap();
        let b = service.generate_refresh_token(user_id).unwrap();
        assert_ne!(a, b);
        assert_ne!(blacklist_key(&a), blacklist_key(&b));
    }
}
