//! Recovery-question vaults.
//!
//! - [`share`]: answer-keyed encryption of individual shares
//! - [`question`]: question records and sets
//! - [`timelock`]: release-round gate around a question set

pub mod question;
pub mod share;
pub mod timelock;

pub use question::{QuestionData, QuestionRecord, QuestionSet};
pub use share::{decrypt_share, encrypt_share, normalize_answer};
pub use timelock::{RoundClock, RoundGate, TimeGate};
