//! Object storage for release artifacts

use std::time::Duration;

use anyhow::Result;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{Client, config::Region, presigning::PresigningConfig};
use chrono::{DateTime, Utc};
use tracing::info;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, R2, ...)
    pub endpoint: Option<String>,
    pub presign_ttl_seconds: u64,
}

impl StorageConfig {
    /// Create a new StorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `STORAGE_BUCKET`: bucket holding release artifacts (default: "releases")
    /// - `STORAGE_REGION`: bucket region (default: "us-east-1")
    /// - `STORAGE_ENDPOINT`: optional S3-compatible endpoint URL
    /// - `STORAGE_PRESIGN_TTL_SECONDS`: download link lifetime (default: 300)
    pub fn from_env() -> Self {
        Self {
            bucket: std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "releases".to_string()),
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: std::env::var("STORAGE_ENDPOINT").ok(),
            presign_ttl_seconds: std::env::var("STORAGE_PRESIGN_TTL_SECONDS")
                .ok()
                .and_then(|ttl| ttl.parse().ok())
                .unwrap_or(300),
        }
    }
}

/// Time-limited download link
#[derive(Debug, Clone)]
pub struct PresignedDownload {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Release artifact store
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    ttl: Duration,
}

impl Storage {
    pub fn new(client: Client, bucket: String, ttl: Duration) -> Self {
        Self { client, bucket, ttl }
    }

    /// Build a client from the default AWS credential chain
    pub async fn from_config(config: StorageConfig) -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).region(Region::new(config.region));
        if let Some(endpoint) = config.endpoint {
            info!("Using S3 endpoint {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(
            Client::from_conf(builder.build()),
            config.bucket,
            Duration::from_secs(config.presign_ttl_seconds),
        )
    }

    /// Presign a GET for `key`
    pub async fn presign_download(&self, key: &str) -> Result<PresignedDownload> {
        let expires_at = Utc::now() + chrono::Duration::from_std(self.ttl)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(self.ttl)?)
            .await?;

        Ok(PresignedDownload {
            url: request.uri().to_string(),
            expires_at,
        })
    }
}

/// Store with static credentials; presigning needs no network
#[cfg(test)]
pub(crate) fn offline_storage() -> Storage {
    let config = aws_sdk_s3::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(aws_sdk_s3::config::Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"))
        .build();

    Storage::new(
        Client::from_conf(config),
        "releases".to_string(),
        Duration::from_secs(300),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_presigned_url_names_object_and_expiry() {
        let storage = offline_storage();
        let before = Utc::now();

        let download = storage
            .presign_download("builds/1.2.0/setup.exe")
            .await
            .unwrap();

        assert!(download.url.starts_with("https://"));
        assert!(download.url.contains("builds/1.2.0/setup.exe"));
        assert!(download.url.contains("X-Amz-Expires=300"));
        assert!(download.expires_at >= before + chrono::Duration::seconds(300));
    }
}
