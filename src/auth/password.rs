//! Password and access-code hashing using Argon2
//!
//! Uses the argon2id variant with the crate's recommended parameters. Hashes
//! are PHC strings, so the salt and cost travel with the hash.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::types::{Result, VigilError};

/// Hash a password (or one-time code) using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| VigilError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
///
/// Returns true if the password matches the hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| VigilError::Format(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash `candidate` with the salt embedded in `hash` and compare the outputs
/// in constant time.
pub fn matches_hash(candidate: &str, hash: &str) -> Result<bool> {
    let stored = PasswordHash::new(hash)
        .map_err(|e| VigilError::Format(format!("Invalid password hash format: {e}")))?;
    let salt = stored
        .salt
        .ok_or_else(|| VigilError::Format("password hash has no salt".into()))?;
    let stored_output = stored
        .hash
        .ok_or_else(|| VigilError::Format("password hash has no output".into()))?;

    let computed = Argon2::default()
        .hash_password(candidate.as_bytes(), salt)
        .map_err(|e| VigilError::Internal(format!("Failed to hash candidate: {e}")))?;
    let computed_output = computed
        .hash
        .ok_or_else(|| VigilError::Internal("hasher produced no output".into()))?;

    Ok(constant_time_eq(
        computed_output.as_bytes(),
        stored_output.as_bytes(),
    ))
}

/// Compare two byte strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
