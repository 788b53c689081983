//! Persistence layer
//!
//! [`Store`] is the seam between the core and whatever database backs it.
//! [`MemoryStore`] is the shipped single-process implementation.

mod memory;
pub mod schemas;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::Result;
use schemas::{AccessCode, Delivery, PingRecord, Recipient, Secret, SecretAssignment, User};

/// Implemented by every stored record.
pub trait Record: Clone + Send + Sync + 'static {
    /// Table (collection) name, used in error messages and logs
    const TABLE: &'static str;

    fn id(&self) -> &str;
}

/// Async record storage.
///
/// `create_*` fails with `Conflict` when the id exists; `get_*`, `update_*`
/// and `delete_*` fail with `NotFound` when it does not. Backend failures
/// surface as `Storage`.
///
/// The targeted updates below (`record_user_activity`, `mark_triggered`,
/// `mark_access_code_used`, ...) change only the fields they name and test
/// their condition against the stored record in the same atomic step.
/// Anything running concurrently with other writers uses them instead of
/// read-modify-`update_*`.
#[async_trait]
pub trait Store: Send + Sync {
    // Users
    async fn create_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, id: &str) -> Result<User>;
    async fn update_user(&self, user: User) -> Result<()>;
    async fn delete_user(&self, id: &str) -> Result<()>;
    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Set `last_activity`, returning the stored user.
    async fn record_user_activity(&self, id: &str, at: DateTime<Utc>) -> Result<User>;
    async fn schedule_next_ping(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
    /// Set `triggered_at = now` if the stored user is armed, untriggered and
    /// past its deadline at `now`. `None` when the condition no longer holds.
    async fn mark_triggered(&self, id: &str, now: DateTime<Utc>) -> Result<Option<User>>;
    /// Set `released_at` if the user is still in the cycle triggered at `triggered_at`.
    async fn mark_released(
        &self,
        id: &str,
        triggered_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool>;
    /// Clear the trigger and start a fresh cycle at `now`.
    async fn rearm_user(&self, id: &str, now: DateTime<Utc>) -> Result<User>;

    // Secrets
    async fn create_secret(&self, secret: Secret) -> Result<()>;
    async fn get_secret(&self, id: &str) -> Result<Secret>;
    async fn update_secret(&self, secret: Secret) -> Result<()>;
    async fn delete_secret(&self, id: &str) -> Result<()>;
    async fn secrets_for_owner(&self, owner_id: &str) -> Result<Vec<Secret>>;

    // Recipients
    async fn create_recipient(&self, recipient: Recipient) -> Result<()>;
    async fn get_recipient(&self, id: &str) -> Result<Recipient>;
    async fn update_recipient(&self, recipient: Recipient) -> Result<()>;
    async fn delete_recipient(&self, id: &str) -> Result<()>;

    // Assignments
    async fn create_assignment(&self, assignment: SecretAssignment) -> Result<()>;
    async fn get_assignment(&self, id: &str) -> Result<SecretAssignment>;
    async fn update_assignment(&self, assignment: SecretAssignment) -> Result<()>;
    async fn delete_assignment(&self, id: &str) -> Result<()>;
    async fn assignments_for_secret(&self, secret_id: &str) -> Result<Vec<SecretAssignment>>;

    // Pings
    async fn create_ping(&self, ping: PingRecord) -> Result<()>;
    async fn get_ping(&self, id: &str) -> Result<PingRecord>;
    async fn update_ping(&self, ping: PingRecord) -> Result<()>;
    /// Most recently sent ping for the user.
    async fn latest_ping_for_user(&self, user_id: &str) -> Result<Option<PingRecord>>;
    /// `Sent` -> `Delivered`. `false` if the ping has moved on.
    async fn mark_ping_delivered(&self, id: &str) -> Result<bool>;
    /// Outstanding -> `Responded`. `false` if already responded.
    async fn mark_ping_responded(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;

    // Access codes
    async fn create_access_code(&self, code: AccessCode) -> Result<()>;
    async fn get_access_code(&self, id: &str) -> Result<AccessCode>;
    async fn update_access_code(&self, code: AccessCode) -> Result<()>;
    async fn delete_access_code(&self, id: &str) -> Result<()>;
    async fn access_codes_for_delivery(&self, delivery_id: &str) -> Result<Vec<AccessCode>>;
    async fn list_access_codes(&self) -> Result<Vec<AccessCode>>;
    /// Set `used_at` unless it is already set. `false` means another redemption won.
    async fn mark_access_code_used(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;
    /// Count a failed attempt unless the code is already locked; returns the stored code.
    async fn add_access_code_attempt(&self, id: &str) -> Result<AccessCode>;
    /// Take one recovery attempt. `None` when none are left.
    async fn take_answer_attempt(&self, id: &str) -> Result<Option<AccessCode>>;

    // Deliveries
    async fn create_delivery(&self, delivery: Delivery) -> Result<()>;
    async fn get_delivery(&self, id: &str) -> Result<Delivery>;
    /// Count one send attempt, returning the stored delivery.
    async fn add_delivery_attempt(&self, id: &str) -> Result<Delivery>;
    async fn mark_delivery_sent(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
}
