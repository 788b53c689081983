//! Check-in prompt records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;
use crate::scheduler::Urgency;

/// Table name for pings
pub const PING_TABLE: &str = "pings";

/// Delivery state of a check-in prompt.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PingStatus {
    /// Claimed by a tick; the send may not have completed
    Sent,
    /// Handed to the notification channel
    Delivered,
    /// The user acted after the prompt
    Responded,
}

/// One check-in prompt.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PingRecord {
    /// `"{user_id}:{cycle timestamp}"`, unique per prompt cycle
    pub id: String,
    pub user_id: String,
    pub sent_at: DateTime<Utc>,

    /// Channel name used for the prompt
    pub method: String,
    pub status: PingStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,

    /// Scheduled time that produced this prompt
    pub cycle: DateTime<Utc>,
    pub urgency: Urgency,
}

impl PingRecord {
    /// Id for the prompt of `user_id` in the cycle anchored at `cycle`.
    pub fn cycle_id(user_id: &str, cycle: DateTime<Utc>) -> String {
        format!("{}:{}", user_id, cycle.timestamp())
    }

    pub fn sent(
        user_id: &str,
        cycle: DateTime<Utc>,
        now: DateTime<Utc>,
        method: &str,
        urgency: Urgency,
    ) -> Self {
        Self {
            id: Self::cycle_id(user_id, cycle),
            user_id: user_id.to_string(),
            sent_at: now,
            method: method.to_string(),
            status: PingStatus::Sent,
            responded_at: None,
            cycle,
            urgency,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.status != PingStatus::Responded
    }
}

impl Record for PingRecord {
    const TABLE: &'static str = PING_TABLE;

    fn id(&self) -> &str {
        &self.id
    }
}
