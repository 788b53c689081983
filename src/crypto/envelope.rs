//! Two-layer secret envelope.
//!
//! A random data encryption key (DEK) encrypts the secret; a key derived from
//! the owner's master secret wraps the DEK. The stored string is
//!
//! ```text
//! base64( salt[16] ‖ dek_len[4, big-endian] ‖ enc_dek[dek_len] ‖ enc_secret[..] )
//! ```
//!
//! The DEK can be re-wrapped under a new master secret without touching the
//! bulk ciphertext, and the master-derived key never encrypts payload bytes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::debug;
use zeroize::Zeroizing;

use crate::types::{Result, VigilError};

use super::cipher::{open, seal};
use super::generate_random_bytes;
use super::kdf::{derive_key_with, KdfParams, SALT_LEN};

/// DEK length (32 bytes)
pub const DEK_LEN: usize = 32;

/// Salt plus the 4-byte DEK length prefix
pub const HEADER_LEN: usize = SALT_LEN + 4;

/// Parsed, still-encrypted envelope parts.
struct EnvelopeParts {
    salt: [u8; SALT_LEN],
    enc_dek: Vec<u8>,
    enc_secret: Vec<u8>,
}

impl EnvelopeParts {
    fn parse(envelope: &str) -> Result<Self> {
        let raw = BASE64.decode(envelope.trim())?;
        if raw.len() < HEADER_LEN {
            return Err(VigilError::Format(format!(
                "envelope too short: {} bytes, need at least {}",
                raw.len(),
                HEADER_LEN
            )));
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&raw[..SALT_LEN]);

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&raw[SALT_LEN..HEADER_LEN]);
        let dek_len = u32::from_be_bytes(len_bytes) as usize;

        let rest = &raw[HEADER_LEN..];
        if dek_len > rest.len() {
            return Err(VigilError::Format(format!(
                "envelope truncated: DEK length {} exceeds remaining {} bytes",
                dek_len,
                rest.len()
            )));
        }

        let (enc_dek, enc_secret) = rest.split_at(dek_len);
        Ok(Self {
            salt,
            enc_dek: enc_dek.to_vec(),
            enc_secret: enc_secret.to_vec(),
        })
    }

    fn encode(&self) -> Result<String> {
        let dek_len = u32::try_from(self.enc_dek.len())
            .map_err(|_| VigilError::Internal("encrypted DEK too large".into()))?;

        let mut raw =
            Vec::with_capacity(HEADER_LEN + self.enc_dek.len() + self.enc_secret.len());
        raw.extend_from_slice(&self.salt);
        raw.extend_from_slice(&dek_len.to_be_bytes());
        raw.extend_from_slice(&self.enc_dek);
        raw.extend_from_slice(&self.enc_secret);
        Ok(BASE64.encode(raw))
    }

    fn unwrap_dek(&self, params: &KdfParams, master_key: &[u8]) -> Result<Zeroizing<[u8; DEK_LEN]>> {
        let (wrapping_key, _) = derive_key_with(params, master_key, Some(&self.salt))?;
        let dek_bytes = open(&wrapping_key, &self.enc_dek)?;
        if dek_bytes.len() != DEK_LEN {
            return Err(VigilError::Format(format!(
                "invalid DEK length: expected {}, got {}",
                DEK_LEN,
                dek_bytes.len()
            )));
        }

        let mut dek = Zeroizing::new([0u8; DEK_LEN]);
        dek.copy_from_slice(&dek_bytes);
        Ok(dek)
    }
}

/// Seals secrets into envelope strings.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec {
    params: KdfParams,
}

impl EnvelopeCodec {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Encrypt `secret` under a fresh DEK wrapped by `master_key`.
    pub fn pack(&self, secret: &[u8], master_key: &[u8]) -> Result<String> {
        let (wrapping_key, salt) = derive_key_with(&self.params, master_key, None)?;
        let dek = Zeroizing::new(generate_random_bytes::<DEK_LEN>());

        let parts = EnvelopeParts {
            salt,
            enc_dek: seal(&wrapping_key, dek.as_slice())?,
            enc_secret: seal(&dek, secret)?,
        };

        debug!(secret_len = secret.len(), "Packed secret envelope");
        parts.encode()
    }

    /// Decrypt an envelope produced by [`EnvelopeCodec::pack`].
    pub fn unpack(&self, envelope: &str, master_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let parts = EnvelopeParts::parse(envelope)?;
        let dek = parts.unwrap_dek(&self.params, master_key)?;
        open(&dek, &parts.enc_secret)
    }

    /// Re-wrap the DEK under `new_master_key`, leaving the secret ciphertext untouched.
    pub fn rewrap(&self, envelope: &str, old_master_key: &[u8], new_master_key: &[u8]) -> Result<String> {
        let parts = EnvelopeParts::parse(envelope)?;
        let dek = parts.unwrap_dek(&self.params, old_master_key)?;

        let (wrapping_key, salt) = derive_key_with(&self.params, new_master_key, None)?;
        let rewrapped = EnvelopeParts {
            salt,
            enc_dek: seal(&wrapping_key, dek.as_slice())?,
            enc_secret: parts.enc_secret,
        };

        debug!("Re-wrapped secret envelope DEK");
        rewrapped.encode()
    }
}

/// Pack with the default KDF parameters.
pub fn pack(secret: &[u8], master_key: &[u8]) -> Result<String> {
    EnvelopeCodec::default().pack(secret, master_key)
}

/// Unpack with the default KDF parameters.
pub fn unpack(envelope: &str, master_key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    EnvelopeCodec::default().unpack(envelope, master_key)
}
