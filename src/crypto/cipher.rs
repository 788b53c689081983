//! Authenticated symmetric encryption (ChaCha20-Poly1305).
//!
//! Wire format: `nonce[12] ‖ ciphertext ‖ tag[16]`. A fresh random nonce is
//! drawn for every call.

use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use zeroize::Zeroizing;

use crate::types::{Result, VigilError};

use super::generate_random_bytes;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// ChaCha20-Poly1305 auth tag length (16 bytes)
pub const AUTH_TAG_LEN: usize = 16;

/// Encrypt `plaintext` under a 32-byte key, prepending the nonce.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce: [u8; NONCE_LEN] = generate_random_bytes();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| VigilError::Internal(format!("Encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data produced by [`seal`].
///
/// # Errors
///
/// - `Format` if `data` is shorter than the nonce
/// - `Crypto` if authentication fails (wrong key or tampering alike)
pub fn open(key: &[u8; 32], data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if data.len() < NONCE_LEN {
        return Err(VigilError::Format(format!(
            "ciphertext too short: {} bytes, need at least {}",
            data.len(),
            NONCE_LEN
        )));
    }

    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| VigilError::Crypto)
}
