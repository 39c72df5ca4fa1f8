use anyhow::Result;
use std::env;

/// Housekeeping configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Six-field cron expression (seconds first)
    pub schedule: String,
    /// Attempt-log rows older than this are deleted
    pub attempt_retention_days: i64,
}

impl MaintenanceConfig {
    /// Create a new MaintenanceConfig from environment variables
    ///
    /// # Environment Variables
    /// - `MAINTENANCE_SCHEDULE`: cron expression (default: every 5 minutes)
    /// - `ATTEMPT_RETENTION_DAYS`: attempt-log retention (default: 7)
    pub fn from_env() -> Result<Self> {
        let schedule =
            env::var("MAINTENANCE_SCHEDULE").unwrap_or_else(|_| "0 */5 * * * *".to_string());

        let attempt_retention_days = env::var("ATTEMPT_RETENTION_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse::<i64>()
            .map_err(|e| anyhow::anyhow!("Invalid ATTEMPT_RETENTION_DAYS: {}", e))?;

        if attempt_retention_days < 1 {
            anyhow::bail!("ATTEMPT_RETENTION_DAYS must be at least 1");
        }

        Ok(Self {
            schedule,
            attempt_retention_days,
        })
    }
}
