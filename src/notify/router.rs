//! Name-based channel dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Channel, LogChannel, Message, NotificationSink};
use crate::db::schemas::{Recipient, User};
use crate::scheduler::Urgency;
use crate::types::{Result, VigilError};

/// Routes each message to the channel named on the user or recipient.
#[derive(Default, Clone)]
pub struct ChannelRouter {
    channels: HashMap<String, Arc<dyn Channel>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A router with only the log channel registered.
    pub fn with_log() -> Self {
        Self::new().with_channel(Arc::new(LogChannel))
    }

    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.register(channel);
        self
    }

    /// Register `channel`, replacing any channel with the same name.
    pub fn register(&mut self, channel: Arc<dyn Channel>) {
        self.channels.insert(channel.name().to_string(), channel);
    }

    pub fn channel_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    async fn dispatch(&self, channel: &str, message: Message) -> Result<()> {
        let target = self
            .channels
            .get(channel)
            .ok_or_else(|| VigilError::Notification(format!("unknown channel: {}", channel)))?;

        debug!(channel, kind = ?message.kind, "Dispatching notification");
        target.send(&message).await
    }
}

#[async_trait]
impl NotificationSink for ChannelRouter {
    async fn send_check_in_prompt(&self, user: &User, urgency: Urgency) -> Result<()> {
        self.dispatch(&user.notify_channel, Message::check_in_prompt(user, urgency))
            .await
    }

    async fn deliver_secret(&self, recipient: &Recipient, link: &str) -> Result<()> {
        self.dispatch(&recipient.channel, Message::secret_delivery(recipient, link))
            .await
    }
}
