//! Verified-identity seam
//!
//! Sign-in methods resolve credentials to a user id through
//! [`IdentityProvider`]. Every successful sign-in counts as check-in activity.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::challenge::ChallengeStore;
use super::password::{hash_password, verify_password};
use crate::db::Store;
use crate::scheduler::SwitchScheduler;
use crate::types::{Result, VigilError};

/// Credentials presented at sign-in.
pub enum Credentials {
    Password {
        identifier: String,
        password: String,
    },
    Passkey {
        /// Session id the challenge was issued under
        session_id: String,
        /// Client assertion, opaque to this crate
        response: Vec<u8>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { identifier, .. } => f
                .debug_struct("Password")
                .field("identifier", identifier)
                .finish_non_exhaustive(),
            Self::Passkey { session_id, .. } => f
                .debug_struct("Passkey")
                .field("session_id", session_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Resolves credentials to a user id, or fails with `Unauthorized`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, credentials: &Credentials) -> Result<String>;
}

/// Identifier + password against stored Argon2 PHC hashes.
///
/// Unknown identifiers are checked against a throwaway hash so they cost
/// the same Argon2 work as a wrong password.
pub struct PasswordIdentity {
    store: Arc<dyn Store>,
    dummy_hash: String,
}

impl PasswordIdentity {
    pub fn new(store: Arc<dyn Store>) -> Result<Self> {
        Ok(Self {
            store,
            dummy_hash: hash_password("vigil-unknown-identifier")?,
        })
    }
}

#[async_trait]
impl IdentityProvider for PasswordIdentity {
    async fn verify(&self, credentials: &Credentials) -> Result<String> {
        let Credentials::Password {
            identifier,
            password,
        } = credentials
        else {
            return Err(VigilError::Unauthorized("unsupported credentials".into()));
        };

        let invalid = || VigilError::Unauthorized("invalid identifier or password".into());
        let Some(user) = self.store.find_user_by_identifier(identifier).await? else {
            verify_password(password, &self.dummy_hash)?;
            return Err(invalid());
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Password sign-in rejected");
            return Err(invalid());
        }
        Ok(user.id)
    }
}

/// Checks a WebAuthn assertion against the challenge it answers.
///
/// Implemented by the WebAuthn library in use; returns the user id the
/// credential belongs to.
#[async_trait]
pub trait AssertionVerifier: Send + Sync {
    async fn verify_assertion(&self, challenge: &[u8], response: &[u8]) -> Result<String>;
}

/// Passkey sign-in: consumes the issued challenge, then delegates the
/// signature check.
pub struct PasskeyIdentity {
    challenges: Arc<dyn ChallengeStore>,
    verifier: Arc<dyn AssertionVerifier>,
}

impl PasskeyIdentity {
    pub fn new(challenges: Arc<dyn ChallengeStore>, verifier: Arc<dyn AssertionVerifier>) -> Self {
        Self {
            challenges,
            verifier,
        }
    }
}

#[async_trait]
impl IdentityProvider for PasskeyIdentity {
    async fn verify(&self, credentials: &Credentials) -> Result<String> {
        let Credentials::Passkey {
            session_id,
            response,
        } = credentials
        else {
            return Err(VigilError::Unauthorized("unsupported credentials".into()));
        };

        let pending = self
            .challenges
            .take(session_id)
            .ok_or_else(|| VigilError::Unauthorized("unknown or expired challenge".into()))?;

        let user_id = self
            .verifier
            .verify_assertion(&pending.challenge, response)
            .await?;

        if let Some(expected) = &pending.user_id {
            if *expected != user_id {
                return Err(VigilError::Unauthorized(
                    "credential does not belong to this user".into(),
                ));
            }
        }
        Ok(user_id)
    }
}

/// Verify credentials and record the sign-in as check-in activity.
pub async fn sign_in(
    provider: &dyn IdentityProvider,
    scheduler: &SwitchScheduler,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Result<String> {
    let user_id = provider.verify(credentials).await?;
    scheduler.record_activity(&user_id, now).await?;
    debug!(user_id = %user_id, "Signed in");
    Ok(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, MemoryChallengeStore};
    use crate::db::schemas::User;
    use crate::db::MemoryStore;
    use crate::scheduler::CheckInState;
    use chrono::Duration;

    struct EchoVerifier;

    #[async_trait]
    impl AssertionVerifier for EchoVerifier {
        async fn verify_assertion(&self, challenge: &[u8], response: &[u8]) -> Result<String> {
            if challenge == response {
                Ok("user-1".into())
            } else {
                Err(VigilError::Unauthorized("bad signature".into()))
            }
        }
    }

    #[tokio::test]
    async fn test_password_identity() {
        let store = Arc::new(MemoryStore::new());
        let user = User::new(
            "alice@example.com".into(),
            hash_password("hunter2").unwrap(),
            CheckInState::new(Utc::now(), Duration::days(7), Duration::days(14)),
            "alice@example.com".into(),
        );
        store.create_user(user.clone()).await.unwrap();
        let provider = PasswordIdentity::new(store).unwrap();
        assert!(provider.dummy_hash.starts_with("$argon2id$"));

        let ok = Credentials::Password {
            identifier: "alice@example.com".into(),
            password: "hunter2".into(),
        };
        assert_eq!(provider.verify(&ok).await.unwrap(), user.id);

        let wrong = Credentials::Password {
            identifier: "alice@example.com".into(),
            password: "hunter3".into(),
        };
        assert!(matches!(
            provider.verify(&wrong).await,
            Err(VigilError::Unauthorized(_))
        ));

        let unknown = Credentials::Password {
            identifier: "mallory@example.com".into(),
            password: "hunter2".into(),
        };
        assert!(matches!(
            provider.verify(&unknown).await,
            Err(VigilError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_passkey_challenge_is_single_use() {
        let challenges = Arc::new(MemoryChallengeStore::with_defaults());
        let provider = PasskeyIdentity::new(challenges.clone(), Arc::new(EchoVerifier));

        let (session_id, challenge) = challenges.issue(Some("user-1".into()));
        let creds = Credentials::Passkey {
            session_id,
            response: challenge,
        };

        assert_eq!(provider.verify(&creds).await.unwrap(), "user-1");
        assert!(matches!(
            provider.verify(&creds).await,
            Err(VigilError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_passkey_user_mismatch() {
        let challenges = Arc::new(MemoryChallengeStore::with_defaults());
        let provider = PasskeyIdentity::new(challenges.clone(), Arc::new(EchoVerifier));

        let (session_id, challenge) = challenges.issue(Some("user-2".into()));
        let creds = Credentials::Passkey {
            session_id,
            response: challenge,
        };
        assert!(matches!(
            provider.verify(&creds).await,
            Err(VigilError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = Credentials::Password {
            identifier: "a".into(),
            password: "secret-pw".into(),
        };
        assert!(!format!("{:?}", creds).contains("secret-pw"));
    }
}
