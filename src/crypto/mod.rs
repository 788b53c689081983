//! Cryptographic primitives for stored secrets.
//!
//! # Algorithms
//!
//! - **Key Derivation**: Argon2id (memory-hard, brute-force resistant)
//! - **Encryption**: ChaCha20-Poly1305 (authenticated encryption)
//! - **Storage**: two-layer envelope (DEK wrapped by a master-derived key)
//!
//! All functions are pure; nothing here holds shared mutable state.

pub mod cipher;
pub mod envelope;
pub mod kdf;

use rand::rngs::OsRng;
use rand::RngCore;

pub use cipher::{open, seal, AUTH_TAG_LEN, NONCE_LEN};
pub use envelope::{pack, unpack, EnvelopeCodec};
pub use kdf::{derive_key, derive_key_with, DerivedKey, KdfParams, KEY_LEN, SALT_LEN};

/// Generate cryptographically secure random bytes.
///
/// Panics only if the OS random source is unavailable, which is fatal for
/// every operation in this crate.
pub fn generate_random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes() {
        let bytes1: [u8; 16] = generate_random_bytes();
        let bytes2: [u8; 16] = generate_random_bytes();
        assert_ne!(bytes1, bytes2);
    }
}
