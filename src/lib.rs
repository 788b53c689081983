//! Vigil - dead man's switch for secrets
//!
//! An owner's secrets are released to designated recipients only after the
//! owner stops answering periodic check-ins.
//!
//! ## Pipeline
//!
//! - **Envelope**: secrets at rest under a DEK wrapped by the owner's master password
//! - **Threshold**: k-of-n Shamir shares of the secret, one per recovery question
//! - **Vault**: each share encrypted under its answer, the set time-gated until the deadline
//! - **Scheduler**: check-in prompts with escalating urgency; triggers release on silence
//! - **Delivery**: one-time access codes sent to recipients

pub mod app;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod delivery;
pub mod notify;
pub mod recovery;
pub mod scheduler;
pub mod services;
pub mod threshold;
pub mod types;
pub mod vault;

pub use app::App;
pub use config::Args;
pub use types::{Result, VigilError};
