//! One-time access code schema
//!
//! Only the Argon2 PHC hash of a code is stored. The plaintext is shown to
//! the recipient once, inside the delivery link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

use super::new_id;

/// Table name for access codes
pub const ACCESS_CODE_TABLE: &str = "access_codes";

/// Failed attempts allowed before a code locks
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AccessCode {
    pub id: String,
    pub recipient_id: String,
    pub delivery_id: String,
    pub assignment_id: String,

    /// Argon2 PHC hash of the code
    pub code_hash: String,

    pub expires_at: DateTime<Utc>,

    #[serde(default)]
    pub attempt_count: u32,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Recovery attempts made with this code after redemption
    #[serde(default)]
    pub answer_attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl AccessCode {
    pub fn new(
        recipient_id: String,
        delivery_id: String,
        assignment_id: String,
        code_hash: String,
        expires_at: DateTime<Utc>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: new_id(),
            recipient_id,
            delivery_id,
            assignment_id,
            code_hash,
            expires_at,
            attempt_count: 0,
            max_attempts,
            answer_attempts: 0,
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_locked(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// No recovery attempts left.
    pub fn answers_exhausted(&self) -> bool {
        self.answer_attempts >= self.max_attempts
    }

    /// Unused, unexpired and not locked.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_used() && !self.is_expired(now) && !self.is_locked()
    }
}

impl Record for AccessCode {
    const TABLE: &'static str = ACCESS_CODE_TABLE;

    fn id(&self) -> &str {
        &self.id
    }
}
