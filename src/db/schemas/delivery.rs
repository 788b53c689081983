//! Delivery records: one per recipient per trigger

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

/// Table name for deliveries
pub const DELIVERY_TABLE: &str = "deliveries";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Claimed; the link has not reached the recipient yet
    #[default]
    Pending,
    Delivered,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// `"{assignment_id}:{trigger timestamp}"`
    pub id: String,

    /// Owner whose switch fired
    pub user_id: String,
    pub recipient_id: String,
    pub assignment_id: String,

    /// Trigger this delivery belongs to
    pub triggered_at: DateTime<Utc>,

    #[serde(default)]
    pub status: DeliveryStatus,

    /// Send attempts so far
    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl Delivery {
    /// Id for the delivery of `assignment_id` in the cycle triggered at `triggered_at`.
    pub fn trigger_id(assignment_id: &str, triggered_at: DateTime<Utc>) -> String {
        format!("{}:{}", assignment_id, triggered_at.timestamp())
    }

    pub fn new(
        user_id: String,
        recipient_id: String,
        assignment_id: String,
        triggered_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::trigger_id(&assignment_id, triggered_at),
            user_id,
            recipient_id,
            assignment_id,
            triggered_at,
            status: DeliveryStatus::Pending,
            attempts: 0,
            delivered_at: None,
            created_at: now,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

impl Record for Delivery {
    const TABLE: &'static str = DELIVERY_TABLE;

    fn id(&self) -> &str {
        &self.id
    }
}
