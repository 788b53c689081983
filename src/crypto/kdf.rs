//! Key derivation from passwords and question answers.
//!
//! Argon2id with the same cost profile doorway uses for custodial keys:
//! - 64 MB memory
//! - 3 iterations
//! - 4 parallelism lanes

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::types::{Result, VigilError};

use super::generate_random_bytes;

/// Argon2id memory cost in KiB (64 MB)
pub const ARGON2_MEMORY_KB: u32 = 65536;

/// Argon2id iteration count
pub const ARGON2_ITERATIONS: u32 = 3;

/// Argon2id parallelism (lanes)
pub const ARGON2_PARALLELISM: u32 = 4;

/// Salt length for key derivation (16 bytes)
pub const SALT_LEN: usize = 16;

/// Derived key length (32 bytes)
pub const KEY_LEN: usize = 32;

/// A derived 256-bit key, wiped on drop.
pub type DerivedKey = Zeroizing<[u8; KEY_LEN]>;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: ARGON2_MEMORY_KB,
            iterations: ARGON2_ITERATIONS,
            parallelism: ARGON2_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// Reject settings weaker than the production floor.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < ARGON2_MEMORY_KB {
            return Err(VigilError::Config(format!(
                "KDF memory must be at least {} KiB, got {}",
                ARGON2_MEMORY_KB, self.memory_kib
            )));
        }
        if self.iterations < ARGON2_ITERATIONS {
            return Err(VigilError::Config(format!(
                "KDF iterations must be at least {}, got {}",
                ARGON2_ITERATIONS, self.iterations
            )));
        }
        if self.parallelism < ARGON2_PARALLELISM {
            return Err(VigilError::Config(format!(
                "KDF parallelism must be at least {}, got {}",
                ARGON2_PARALLELISM, self.parallelism
            )));
        }
        Ok(())
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VigilError::Internal(format!("Invalid Argon2 params: {e}")))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Derive a 256-bit key from a secret string with the default parameters.
///
/// When `salt` is `None` a fresh random salt is generated. The salt actually
/// used is returned alongside the key so callers can store it.
pub fn derive_key(secret: &[u8], salt: Option<&[u8; SALT_LEN]>) -> Result<(DerivedKey, [u8; SALT_LEN])> {
    derive_key_with(&KdfParams::default(), secret, salt)
}

/// Derive a 256-bit key with explicit cost parameters.
pub fn derive_key_with(
    params: &KdfParams,
    secret: &[u8],
    salt: Option<&[u8; SALT_LEN]>,
) -> Result<(DerivedKey, [u8; SALT_LEN])> {
    let salt = match salt {
        Some(s) => *s,
        None => generate_random_bytes::<SALT_LEN>(),
    };

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    params
        .argon2()?
        .hash_password_into(secret, &salt, &mut key[..])
        .map_err(|e| VigilError::Internal(format!("Key derivation failed: {e}")))?;

    Ok((key, salt))
}
