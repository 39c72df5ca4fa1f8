//! Outbound mail for one-time codes and device verification links
//!
//! Production posts JSON to a transactional mail HTTP endpoint. Without an
//! endpoint configured, messages are only logged.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, error, info};

/// Mailer configuration
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// HTTP endpoint accepting `{from, to, subject, text}` JSON
    pub endpoint: Option<String>,
    /// Bearer key for the endpoint
    pub api_key: Option<String>,
    /// Sender address
    pub from: String,
}

impl MailerConfig {
    /// Create a new MailerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `MAILER_ENDPOINT`: mail API URL; unset logs messages instead
    /// - `MAILER_API_KEY`: bearer key for the mail API
    /// - `MAILER_FROM`: sender address (default: "no-reply@localhost")
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("MAILER_ENDPOINT").ok(),
            api_key: std::env::var("MAILER_API_KEY").ok(),
            from: std::env::var("MAILER_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string()),
        }
    }
}

/// A plain-text message
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

impl Email {
    /// Step-up sign-in code
    pub fn one_time_code(to: &str, code: &str, ttl_minutes: u64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Your sign-in code".to_string(),
            text: format!(
                "Your sign-in code is {code}.\n\nIt expires in {ttl_minutes} minutes. \
                 If you did not try to sign in, you can ignore this message."
            ),
        }
    }

    /// Link that promotes a pending device to trusted
    pub fn device_verification(to: &str, link: &str, label: Option<&str>) -> Self {
        let device = label.unwrap_or("a new device");
        Self {
            to: to.to_string(),
            subject: "Confirm your device".to_string(),
            text: format!(
                "Someone asked to trust {device} for your account.\n\n\
                 Open this link on that device to confirm:\n{link}\n\n\
                 The link expires in one hour."
            ),
        }
    }
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Mail transport
#[derive(Clone)]
pub enum Mailer {
    Http {
        client: reqwest::Client,
        endpoint: String,
        api_key: Option<String>,
        from: String,
    },
    Log,
}

impl Mailer {
    /// Build the mailer described by `config`
    pub fn from_config(config: MailerConfig) -> Self {
        match config.endpoint {
            Some(endpoint) => Mailer::Http {
                client: reqwest::Client::new(),
                endpoint,
                api_key: config.api_key,
                from: config.from,
            },
            None => {
                info!("MAILER_ENDPOINT not set, outbound mail will only be logged");
                Mailer::Log
            }
        }
    }

    /// Deliver a message
    pub async fn send(&self, email: &Email) -> Result<()> {
        match self {
            Mailer::Http {
                client,
                endpoint,
                api_key,
                from,
            } => {
                let mut request = client.post(endpoint).json(&OutboundMessage {
                    from,
                    to: &email.to,
                    subject: &email.subject,
                    text: &email.text,
                });
                if let Some(key) = api_key {
                    request = request.bearer_auth(key);
                }

                let response = request.send().await?;
                if !response.status().is_success() {
                    error!("Mail API rejected message to {}: {}", email.to, response.status());
                    anyhow::bail!("Mail API responded with {}", response.status());
                }

                info!("Sent \"{}\" to {}", email.subject, email.to);
                Ok(())
            }
            Mailer::Log => {
                info!("Mail to {}: {}", email.to, email.subject);
                debug!("{}", email.text);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_time_code_mentions_code_and_expiry() {
        let email = Email::one_time_code("jane@example.com", "123456", 10);
        assert!(email.text.contains("123456"));
        assert!(email.text.contains("10 minutes"));
    }

    #[test]
    fn test_device_verification_contains_link() {
        let email = Email::device_verification(
            "jane@example.com",
            "https://portal.example/devices/confirm?device_id=d&token=t",
            Some("Work laptop"),
        );
        assert!(email.text.contains("Work laptop"));
        assert!(email.text.contains("device_id=d&token=t"));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = Mailer::from_config(MailerConfig {
            endpoint: None,
            api_key: None,
            from: "no-reply@localhost".to_string(),
        });
        let email = Email::one_time_code("jane@example.com", "123456", 10);
        assert!(mailer.send(&email).await.is_ok());
    }
}
