//! Built-in channels.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Channel, Message};
use crate::types::{Result, VigilError};

pub const LOG_CHANNEL: &str = "log";
pub const WEBHOOK_CHANNEL: &str = "webhook";

/// Writes messages to the tracing log. Links are never logged.
#[derive(Debug, Default, Clone)]
pub struct LogChannel;

#[async_trait]
impl Channel for LogChannel {
    fn name(&self) -> &str {
        LOG_CHANNEL
    }

    async fn send(&self, message: &Message) -> Result<()> {
        info!(
            kind = ?message.kind,
            to = %message.to,
            subject = %message.subject,
            has_link = message.link.is_some(),
            "Notification"
        );
        Ok(())
    }
}

/// POSTs messages as JSON to a fixed endpoint.
pub struct WebhookChannel {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VigilError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        WEBHOOK_CHANNEL
    }

    async fn send(&self, message: &Message) -> Result<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VigilError::Notification(format!(
                "webhook returned {}",
                status
            )));
        }

        debug!(kind = ?message.kind, status = %status, "Webhook delivered");
        Ok(())
    }
}
