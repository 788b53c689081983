//! Per-share encryption keyed by a security-question answer.
//!
//! The answer is never compared directly: a wrong answer derives a wrong
//! key and the authenticated decrypt fails.

use zeroize::Zeroizing;

use crate::crypto::{derive_key, open, seal, SALT_LEN};
use crate::types::{Result, VigilError};

/// Canonical form of an answer before key derivation.
///
/// Surrounding whitespace and letter case do not change the key.
pub fn normalize_answer(answer: &str) -> Zeroizing<String> {
    Zeroizing::new(answer.trim().to_lowercase())
}

/// Encrypt a share under a key derived from `answer`.
///
/// Returns the ciphertext and the fresh salt used for derivation.
pub fn encrypt_share(share: &[u8], answer: &str) -> Result<(Vec<u8>, [u8; SALT_LEN])> {
    let answer = normalize_answer(answer);
    let (key, salt) = derive_key(answer.as_bytes(), None)?;
    let ciphertext = seal(&key, share)?;
    Ok((ciphertext, salt))
}

/// Decrypt a share with the answer and the salt stored beside it.
///
/// A wrong answer yields `Crypto`, never a wrong share.
pub fn decrypt_share(ciphertext: &[u8], answer: &str, salt: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let salt: &[u8; SALT_LEN] = salt
        .try_into()
        .map_err(|_| VigilError::Format(format!("share salt must be {SALT_LEN} bytes")))?;

    let answer = normalize_answer(answer);
    let (key, _) = derive_key(answer.as_bytes(), Some(salt))?;
    open(&key, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_answer_recovers_share() {
        let (ciphertext, salt) = encrypt_share(b"\x01share-bytes", "Rex").unwrap();
        let share = decrypt_share(&ciphertext, "Rex", &salt).unwrap();
        assert_eq!(share.as_slice(), b"\x01share-bytes");
    }

    #[test]
    fn test_wrong_answer_is_crypto_error() {
        let (ciphertext, salt) = encrypt_share(b"\x01share-bytes", "Rex").unwrap();
        assert!(matches!(
            decrypt_share(&ciphertext, "Fido", &salt),
            Err(VigilError::Crypto)
        ));
    }

    #[test]
    fn test_answer_normalization() {
        let (ciphertext, salt) = encrypt_share(b"\x02abc", "  Paris ").unwrap();
        assert!(decrypt_share(&ciphertext, "paris", &salt).is_ok());
        assert!(decrypt_share(&ciphertext, "PARIS", &salt).is_ok());
    }

    #[test]
    fn test_bad_salt_length_is_format_error() {
        let (ciphertext, _) = encrypt_share(b"\x01x", "a").unwrap();
        assert!(matches!(
            decrypt_share(&ciphertext, "a", &[0u8; 8]),
            Err(VigilError::Format(_))
        ));
    }
}
