//! Outbound notifications
//!
//! The core talks to a [`NotificationSink`]. The shipped sink is
//! [`ChannelRouter`], which dispatches each message to a named [`Channel`]
//! chosen by the user's or recipient's settings.

mod channels;
mod router;

pub use channels::{LogChannel, WebhookChannel, LOG_CHANNEL, WEBHOOK_CHANNEL};
pub use router::ChannelRouter;

use async_trait::async_trait;
use serde::Serialize;

use crate::db::schemas::{Recipient, User};
use crate::scheduler::Urgency;
use crate::types::Result;

/// What a message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    CheckInPrompt,
    SecretDelivery,
}

/// A rendered notification. Webhook payloads serialize it directly.
#[derive(Clone, Serialize)]
pub struct Message {
    pub kind: MessageKind,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Access link; carries a one-time code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("link", &self.link.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl Message {
    pub fn check_in_prompt(user: &User, urgency: Urgency) -> Self {
        let subject = match urgency {
            Urgency::Normal => "Please check in".to_string(),
            Urgency::Urgent => "Check-in needed soon".to_string(),
            Urgency::FinalWarning => "Final warning: check in now".to_string(),
        };
        let body = format!(
            "Sign in before {} to keep your secrets sealed.",
            user.check_in.deadline().to_rfc3339()
        );
        Self {
            kind: MessageKind::CheckInPrompt,
            to: user.notify_address.clone(),
            subject,
            body,
            link: None,
        }
    }

    pub fn secret_delivery(recipient: &Recipient, link: &str) -> Self {
        Self {
            kind: MessageKind::SecretDelivery,
            to: recipient.address.clone(),
            subject: "A secret has been shared with you".to_string(),
            body: format!(
                "{}, someone designated you to receive a secret. Open the link to begin.",
                recipient.name
            ),
            link: Some(link.to_string()),
        }
    }
}

/// A transport for messages: email, SMS, webhook, ...
#[async_trait]
pub trait Channel: Send + Sync {
    /// Name users and recipients select this channel by
    fn name(&self) -> &str;

    async fn send(&self, message: &Message) -> Result<()>;
}

/// Everything the core needs to reach people.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_check_in_prompt(&self, user: &User, urgency: Urgency) -> Result<()>;

    async fn deliver_secret(&self, recipient: &Recipient, link: &str) -> Result<()>;
}
