//! Rate limiter for preventing brute force attacks
//!
//! Failures are appended to an attempts log and counted over a sliding
//! window. Once `max_failures` failures sit inside the window the key is
//! rejected; as the oldest failures age out of the window the key is
//! accepted again.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::repositories::AttemptRepository;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failures tolerated inside the window
    pub max_failures: u32,
    /// Sliding window in seconds
    pub window_seconds: i64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window_seconds: 900, // 15 minutes
        }
    }
}

impl RateLimiterConfig {
    /// Create a new RateLimiterConfig from environment variables
    ///
    /// # Environment Variables
    /// - `RATE_LIMIT_MAX_FAILURES`: failures tolerated per window (default: 5)
    /// - `RATE_LIMIT_WINDOW_SECONDS`: window length (default: 900)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_failures = std::env::var("RATE_LIMIT_MAX_FAILURES")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_failures);

        let window_seconds = std::env::var("RATE_LIMIT_WINDOW_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.window_seconds);

        Self {
            max_failures,
            window_seconds,
        }
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.window_seconds)
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The attempt may proceed; `remaining` failures are still tolerated
    Allowed { remaining: u32 },
    /// The key is limited for another `retry_after` seconds
    Limited { retry_after: u64 },
}

/// Decide from the failures counted inside the window ending at `now`
pub fn decide(
    config: &RateLimiterConfig,
    failures: u32,
    oldest_failure: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Decision {
    if failures < config.max_failures {
        return Decision::Allowed {
            remaining: config.max_failures - failures,
        };
    }

    let retry_after = oldest_failure
        .map(|oldest| (oldest + config.window() - now).num_seconds())
        .unwrap_or(config.window_seconds)
        .max(1);

    Decision::Limited {
        retry_after: retry_after as u64,
    }
}

/// Where attempts are logged
#[derive(Clone)]
pub enum AttemptStore {
    /// `auth_attempts` table, shared by every auth instance
    Postgres(AttemptRepository),
    /// Per-process failure timestamps
    Memory(Arc<Mutex<HashMap<String, Vec<DateTime<Utc>>>>>),
}

/// Rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    store: AttemptStore,
}

impl RateLimiter {
    /// Create a rate limiter over the attempts table
    pub fn new(config: RateLimiterConfig, repository: AttemptRepository) -> Self {
        Self {
            config,
            store: AttemptStore::Postgres(repository),
        }
    }

    /// Create a rate limiter that keeps attempts in memory
    pub fn in_memory(config: RateLimiterConfig) -> Self {
        Self {
            config,
            store: AttemptStore::Memory(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Check whether `key` may attempt again at `now`
    pub async fn check(&self, key: &str, now: DateTime<Utc>) -> Result<Decision> {
        let since = now - self.config.window();

        let (failures, oldest) = match &self.store {
            AttemptStore::Postgres(repository) => repository.failures_since(key, since).await?,
            AttemptStore::Memory(entries) => {
                let mut entries = entries.lock().await;
                match entries.get_mut(key) {
                    Some(failures) => {
                        failures.retain(|at| *at > since);
                        (failures.len() as u32, failures.iter().min().copied())
                    }
                    None => (0, None),
                }
            }
        };

        let decision = decide(&self.config, failures, oldest, now);
        if let Decision::Limited { retry_after } = decision {
            warn!("Rate limited key {} for another {} seconds", key, retry_after);
        }

        Ok(decision)
    }

    /// Log a failed attempt
    pub async fn record_failure(&self, key: &str, now: DateTime<Utc>) -> Result<()> {
        match &self.store {
            AttemptStore::Postgres(repository) => repository.record(key, false, now).await,
            AttemptStore::Memory(entries) => {
                let since = now - self.config.window();
                let mut entries = entries.lock().await;
                let failures = entries.entry(key.to_string()).or_default();
                failures.retain(|at| *at > since);
                failures.push(now);
                Ok(())
            }
        }
    }

    /// Log a successful attempt. Successes never count against the key.
    pub async fn record_success(&self, key: &str, now: DateTime<Utc>) -> Result<()> {
        match &self.store {
            AttemptStore::Postgres(repository) => repository.record(key, true, now).await,
            AttemptStore::Memory(_) => {
                info!("Successful attempt for key {}", key);
                Ok(())
            }
        }
    }

    /// Get the rate limiter configuration
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> RateLimiter {
        RateLimiter::in_memory(RateLimiterConfig {
            max_failures: 3,
            window_seconds: 60,
        })
    }

    #[tokio::test]
    async fn test_rejects_once_threshold_is_reached() {
        let limiter = limiter();
        let now = Utc::now();

        for i in 0..3 {
            let decision = limiter.check("signin:a@b.io", now).await.unwrap();
            assert_eq!(decision, Decision::Allowed { remaining: 3 - i });
            limiter.record_failure("signin:a@b.io", now).await.unwrap();
        }

        let decision = limiter.check("signin:a@b.io", now).await.unwrap();
        assert_eq!(decision, Decision::Limited { retry_after: 60 });
    }

    #[tokio::test]
    async fn test_resets_after_window_elapses() {
        let limiter = limiter();
        let start = Utc::now();

        for _ in 0..3 {
            limiter.record_failure("otp:a@b.io", start).await.unwrap();
        }
        assert!(matches!(
            limiter.check("otp:a@b.io", start + Duration::seconds(59)).await.unwrap(),
            Decision::Limited { retry_after: 1 }
        ));

        let later = start + Duration::seconds(60);
        assert_eq!(
            limiter.check("otp:a@b.io", later).await.unwrap(),
            Decision::Allowed { remaining: 3 }
        );
    }

    #[tokio::test]
    async fn test_failures_age_out_one_by_one() {
        let limiter = limiter();
        let start = Utc::now();

        limiter.record_failure("k", start).await.unwrap();
        limiter
            .record_failure("k", start + Duration::seconds(30))
            .await
            .unwrap();
        limiter
            .record_failure("k", start + Duration::seconds(40))
            .await
            .unwrap();

        // The first failure leaves the window at start + 60s.
        assert_eq!(
            limiter.check("k", start + Duration::seconds(45)).await.unwrap(),
            Decision::Limited { retry_after: 15 }
        );
        assert_eq!(
            limiter.check("k", start + Duration::seconds(61)).await.unwrap(),
            Decision::Allowed { remaining: 1 }
        );
    }

    #[tokio::test]
    async fn test_keys_and_successes_are_independent() {
        let limiter = limiter();
        let now = Utc::now();

        for _ in 0..3 {
            limiter.record_failure("signin:a@b.io", now).await.unwrap();
            limiter.record_success("signin:c@d.io", now).await.unwrap();
        }

        assert!(matches!(
            limiter.check("signin:a@b.io", now).await.unwrap(),
            Decision::Limited { .. }
        ));
        assert_eq!(
            limiter.check("signin:c@d.io", now).await.unwrap(),
            Decision::Allowed { remaining: 3 }
        );
    }

    #[test]
    fn test_decide_without_oldest_uses_full_window() {
        let config = RateLimiterConfig::default();
        let decision = decide(&config, 5, None, Utc::now());
        assert_eq!(decision, Decision::Limited { retry_after: 900 });
    }
}
