//! Record schemas for Vigil
//!
//! Defines the stored structures for users, secrets, recipients, pings,
//! deliveries and access codes.

mod access_code;
mod delivery;
mod ping;
mod secret;
mod user;

pub use access_code::{AccessCode, ACCESS_CODE_TABLE, DEFAULT_MAX_ATTEMPTS};
pub use delivery::{Delivery, DeliveryStatus, DELIVERY_TABLE};
pub use ping::{PingRecord, PingStatus, PING_TABLE};
pub use secret::{
    Recipient, Secret, SecretAssignment, ASSIGNMENT_TABLE, RECIPIENT_TABLE, SECRET_TABLE,
};
pub use user::{User, USER_TABLE};

/// Generate a fresh opaque record id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
