//! Secret, recipient and assignment schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;
use crate::vault::QuestionSet;

use super::new_id;

/// Table name for secrets
pub const SECRET_TABLE: &str = "secrets";

/// Table name for recipients
pub const RECIPIENT_TABLE: &str = "recipients";

/// Table name for secret assignments
pub const ASSIGNMENT_TABLE: &str = "secret_assignments";

/// An owner's secret, stored only as an envelope.
#[derive(Serialize, Deserialize, Clone)]
pub struct Secret {
    pub id: String,
    pub owner_id: String,

    /// Human-readable label
    pub name: String,

    /// Base64 two-layer envelope
    pub envelope: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    pub fn new(owner_id: String, name: String, envelope: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            owner_id,
            name,
            envelope,
            created_at: now,
            updated_at: now,
        }
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("id", &self.id)
            .field("owner_id", &self.owner_id)
            .field("name", &self.name)
            .field("envelope", &"[redacted]")
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl Record for Secret {
    const TABLE: &'static str = SECRET_TABLE;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Someone a secret may be released to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub id: String,
    pub owner_id: String,
    pub name: String,

    /// Notification channel name for deliveries
    pub channel: String,

    /// Channel-specific address
    pub address: String,
}

impl Recipient {
    pub fn new(owner_id: String, name: String, channel: String, address: String) -> Self {
        Self {
            id: new_id(),
            owner_id,
            name,
            channel,
            address,
        }
    }
}

impl Record for Recipient {
    const TABLE: &'static str = RECIPIENT_TABLE;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Binds a secret to a recipient, with the locked recovery questions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SecretAssignment {
    pub id: String,
    pub secret_id: String,
    pub recipient_id: String,

    /// Unset until the owner seals questions for this recipient
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_set: Option<QuestionSet>,
}

impl SecretAssignment {
    pub fn new(secret_id: String, recipient_id: String, question_set: Option<QuestionSet>) -> Self {
        Self {
            id: new_id(),
            secret_id,
            recipient_id,
            question_set,
        }
    }
}

impl Record for SecretAssignment {
    const TABLE: &'static str = ASSIGNMENT_TABLE;

    fn id(&self) -> &str {
        &self.id
    }
}
