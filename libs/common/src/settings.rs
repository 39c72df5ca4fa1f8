//! Service settings loaded with the `config` crate
//!
//! Sources, later ones winning: built-in defaults, an optional
//! `config/<service>.toml`, then `APP_*` environment variables (nested keys
//! separated by `__`, e.g. `APP_QUOTA__WINDOW_SECONDS`).

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Settings common to every HTTP service
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// Public URL of the site, used to build links sent by email
    pub site_url: String,
    /// Quota defaults applied to new profiles and usage windows
    pub quota: QuotaSettings,
}

/// Quota defaults
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QuotaSettings {
    /// Lifetime quota assigned to a new profile
    pub default_limit_seconds: i64,
    /// Length of the rolling usage window
    pub window_seconds: i64,
    /// Usage allowed inside one window
    pub max_usage_seconds: i64,
}

impl ServiceSettings {
    /// Load the settings for `service`, binding to `default_port` unless overridden
    pub fn load(service: &str, default_port: u16) -> Result<Self> {
        let settings = Config::builder()
            .set_default("bind_address", format!("0.0.0.0:{default_port}"))?
            .set_default("site_url", "http://localhost:5173")?
            .set_default("quota.default_limit_seconds", 36_000_i64)?
            .set_default("quota.window_seconds", 86_400_i64)?
            .set_default("quota.max_usage_seconds", 7_200_i64)?
            .add_source(File::with_name(&format!("config/{service}")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: ServiceSettings = settings.try_deserialize()?;
        if settings.quota.window_seconds <= 0 {
            anyhow::bail!("quota.window_seconds must be positive");
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = ServiceSettings::load("settings-test", 3001).unwrap();
        assert_eq!(settings.bind_address, "0.0.0.0:3001");
        assert_eq!(settings.quota.window_seconds, 86_400);
        assert_eq!(settings.quota.max_usage_seconds, 7_200);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            std::env::set_var("APP_QUOTA__WINDOW_SECONDS", "3600");
            std::env::set_var("APP_SITE_URL", "https://portal.example");
        }

        let settings = ServiceSettings::load("settings-test", 3001).unwrap();
        assert_eq!(settings.quota.window_seconds, 3600);
        assert_eq!(settings.site_url, "https://portal.example");

        unsafe {
            std::env::remove_var("APP_QUOTA__WINDOW_SECONDS");
            std::env::remove_var("APP_SITE_URL");
        }
    }

    #[test]
    #[serial]
    fn test_rejects_empty_window() {
        unsafe {
            std::env::set_var("APP_QUOTA__WINDOW_SECONDS", "0");
        }

        assert!(ServiceSettings::load("settings-test", 3001).is_err());

        unsafe {
            std::env::remove_var("APP_QUOTA__WINDOW_SECONDS");
        }
    }
}
