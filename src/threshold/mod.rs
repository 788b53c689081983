//! Threshold secret sharing.
//!
//! Shamir's scheme over GF(2^8). Any `k` of `n` shares reconstruct the secret
//! exactly; fewer are rejected by an embedded digest rather than producing
//! garbage that looks like a secret.

pub mod gf256;
pub mod shamir;

pub use shamir::{combine, split, MAX_SHARES};
