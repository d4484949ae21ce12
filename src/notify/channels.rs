//! Delivery channel transports
//!
//! One transport per channel, resolved from configuration at startup.
//! `attempt` is the only entry point the dispatcher uses; it converts
//! every failure into a channel status so delivery problems can never
//! propagate into the business operation that triggered the send.

use serde_json::json;

/// Delivery outcome of one channel attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Pending,
    Sent,
    Failed,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Pending => "PENDING",
            ChannelStatus::Sent => "SENT",
            ChannelStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ChannelStatus::Pending),
            "SENT" => Some(ChannelStatus::Sent),
            "FAILED" => Some(ChannelStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("channel is not configured")]
    NotConfigured,

    #[error("recipient has no {0} on file")]
    MissingContact(&'static str),

    #[error("gateway returned status {0}")]
    Gateway(u16),

    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// How a channel physically delivers
#[derive(Debug, Clone)]
pub enum Transport {
    /// JSON POST to an external gateway
    Http { client: reqwest::Client, url: String },
    /// Development: log the message and report success
    Console,
    /// No gateway configured in production: every attempt fails locally
    Disabled,
}

impl Transport {
    pub fn from_config(gateway_url: Option<&str>, production: bool) -> Self {
        match gateway_url {
            Some(url) => Transport::Http {
                client: reqwest::Client::new(),
                url: url.to_string(),
            },
            None if production => Transport::Disabled,
            None => Transport::Console,
        }
    }

    async fn deliver(
        &self,
        to: &str,
        subject: Option<&str>,
        body: &str,
    ) -> Result<(), DeliveryError> {
        match self {
            Transport::Http { client, url } => {
                let response = client
                    .post(url)
                    .json(&json!({
                        "to": to,
                        "subject": subject,
                        "body": body,
                    }))
                    .send()
                    .await?;

                if !response.status().is_success() {
                    return Err(DeliveryError::Gateway(response.status().as_u16()));
                }
                Ok(())
            }
            Transport::Console => {
                tracing::info!("Console delivery to {}: {}", to, body);
                Ok(())
            }
            Transport::Disabled => Err(DeliveryError::NotConfigured),
        }
    }
}

/// The per-channel transports the dispatcher works with
#[derive(Debug, Clone)]
pub struct Transports {
    pub sms: Transport,
    pub email: Transport,
}

/// One channel attempt. Infallible by construction: a missing contact or
/// a failed delivery becomes FAILED and a warning, never an error.
pub async fn attempt(
    transport: &Transport,
    channel_name: &'static str,
    to: Option<&str>,
    subject: Option<&str>,
    body: &str,
) -> ChannelStatus {
    let result = match to {
        Some(to) if !to.is_empty() => transport.deliver(to, subject, body).await,
        _ => Err(DeliveryError::MissingContact(channel_name)),
    };

    match result {
        Ok(()) => ChannelStatus::Sent,
        Err(err) => {
            tracing::warn!("{} delivery failed: {}", channel_name, err);
            ChannelStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn console_transport_succeeds() {
        let status = attempt(&Transport::Console, "sms", Some("+250788123456"), None, "hello").await;
        assert_eq!(status, ChannelStatus::Sent);
    }

    #[tokio::test]
    async fn disabled_transport_fails_without_raising() {
        let status = attempt(&Transport::Disabled, "sms", Some("+250788123456"), None, "hello").await;
        assert_eq!(status, ChannelStatus::Failed);
    }

    #[tokio::test]
    async fn missing_contact_fails_the_channel() {
        let status = attempt(&Transport::Console, "email", None, Some("subject"), "hello").await;
        assert_eq!(status, ChannelStatus::Failed);

        let status = attempt(&Transport::Console, "email", Some(""), Some("subject"), "hello").await;
        assert_eq!(status, ChannelStatus::Failed);
    }

    #[test]
    fn transport_resolution_follows_environment() {
        assert!(matches!(
            Transport::from_config(Some("https://gateway.example/send"), true),
            Transport::Http { .. }
        ));
        assert!(matches!(Transport::from_config(None, false), Transport::Console));
        assert!(matches!(Transport::from_config(None, true), Transport::Disabled));
    }

    #[test]
    fn channel_status_codes_round_trip() {
        for status in [ChannelStatus::Pending, ChannelStatus::Sent, ChannelStatus::Failed] {
            assert_eq!(ChannelStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ChannelStatus::parse("QUEUED"), None);
    }
}
