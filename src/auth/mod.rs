//! Authentication collaborators
//!
//! Password and access-code hashing, the in-flight challenge map and the
//! verified-identity seam.

pub mod challenge;
pub mod identity;
pub mod password;

pub use challenge::{
    ChallengeConfig, ChallengeStatsSnapshot, ChallengeStore, MemoryChallengeStore, TakenChallenge,
};
pub use identity::{
    sign_in, AssertionVerifier, Credentials, IdentityProvider, PasskeyIdentity, PasswordIdentity,
};
pub use password::{constant_time_eq, hash_password, matches_hash, verify_password};
