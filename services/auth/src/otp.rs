//! One-time sign-in codes kept in Redis
//!
//! Only the SHA-256 of a code is stored, under `otp:<email>`, with a TTL.
//! A code is consumed by the first verification attempt, right or wrong.

use anyhow::Result;
use common::{
    cache::RedisPool,
    hashing::{matches_hash, sha256_hex},
};
use rand::Rng;
use tracing::info;

/// Default code lifetime
pub const OTP_TTL_SECONDS: u64 = 600;

/// Redis-backed store for one-time codes
#[derive(Clone)]
pub struct OtpStore {
    redis_pool: RedisPool,
    ttl_seconds: u64,
}

impl OtpStore {
    /// Create a new store
    pub fn new(redis_pool: RedisPool, ttl_seconds: u64) -> Self {
        Self {
            redis_pool,
            ttl_seconds,
        }
    }

    /// Issue a fresh code for `email`, replacing any outstanding one
    pub async fn issue(&self, email: &str) -> Result<String> {
        let code = generate_code();
        self.redis_pool
            .set(&otp_key(email), &sha256_hex(&code), Some(self.ttl_seconds))
            .await?;

        info!("Issued one-time code for {}", email);
        Ok(code)
    }

    /// Verify and consume the outstanding code for `email`
    pub async fn verify(&self, email: &str, code: &str) -> Result<bool> {
        let stored = self.redis_pool.take(&otp_key(email)).await?;
        Ok(stored.is_some_and(|hash| matches_hash(code, &hash)))
    }

    /// Code lifetime in minutes, for messages
    pub fn ttl_minutes(&self) -> u64 {
        self.ttl_seconds.div_ceil(60)
    }
}

fn otp_key(email: &str) -> String {
    format!("otp:{email}")
}

/// Six random decimal digits
pub fn generate_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}
