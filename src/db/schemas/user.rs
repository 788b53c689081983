//! User record schema
//!
//! Stores credentials, the check-in state and where prompts are sent.

use serde::{Deserialize, Serialize};

use crate::db::Record;
use crate::scheduler::CheckInState;

use super::new_id;

/// Table name for users
pub const USER_TABLE: &str = "users";

/// Owner of secrets and subject of the check-in cycle.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: String,

    /// User identifier (email or handle)
    pub identifier: String,

    /// Argon2 PHC password hash
    pub password_hash: String,

    /// Check-in settings and activity
    pub check_in: CheckInState,

    /// Notification channel name prompts are routed through
    #[serde(default = "default_channel")]
    pub notify_channel: String,

    /// Channel-specific address (email, webhook target, ...)
    pub notify_address: String,
}

fn default_channel() -> String {
    "log".to_string()
}

impl User {
    pub fn new(
        identifier: String,
        password_hash: String,
        check_in: CheckInState,
        notify_address: String,
    ) -> Self {
        Self {
            id: new_id(),
            identifier,
            password_hash,
            check_in,
            notify_channel: default_channel(),
            notify_address,
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.notify_channel = channel.into();
        self
    }
}

impl Record for User {
    const TABLE: &'static str = USER_TABLE;

    fn id(&self) -> &str {
        &self.id
    }
}
