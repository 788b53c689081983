//! One-time access codes for secret deliveries.
//!
//! A code is 32 random bytes, hex encoded, handed to the recipient inside the
//! delivery link. Only its Argon2 PHC hash is stored. Verification re-hashes
//! the candidate with each stored salt and compares in constant time.
//!
//! Consuming a code and counting attempts go through the store's
//! conditional updates, so concurrent redemptions of one code yield exactly
//! one success.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::auth::{hash_password, matches_hash};
use crate::crypto::generate_random_bytes;
use crate::db::schemas::{AccessCode, DEFAULT_MAX_ATTEMPTS};
use crate::db::Store;
use crate::types::{Result, VigilError};

/// Random bytes per code before hex encoding
pub const CODE_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct AccessCodeConfig {
    /// How long a code stays redeemable
    pub ttl: Duration,

    /// Failed attempts before a code locks
    pub max_attempts: u32,
}

impl Default for AccessCodeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

pub struct AccessCodeService {
    store: Arc<dyn Store>,
    config: AccessCodeConfig,
}

impl AccessCodeService {
    pub fn new(store: Arc<dyn Store>, config: AccessCodeConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AccessCodeConfig {
        &self.config
    }

    /// Create and store a code for one delivery.
    ///
    /// Returns the plaintext code (shown once) and the stored record.
    pub async fn issue_code(
        &self,
        recipient_id: &str,
        delivery_id: &str,
        assignment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Zeroizing<String>, AccessCode)> {
        let code = Zeroizing::new(hex::encode(generate_random_bytes::<CODE_BYTES>()));
        let record = AccessCode::new(
            recipient_id.to_string(),
            delivery_id.to_string(),
            assignment_id.to_string(),
            hash_password(&code)?,
            now + self.config.ttl,
            self.config.max_attempts,
            now,
        );

        self.store.create_access_code(record.clone()).await?;
        debug!(code_id = %record.id, delivery_id, "Issued access code");
        Ok((code, record))
    }

    /// Check `candidate` against every code of the delivery.
    ///
    /// # Errors
    ///
    /// - `AlreadyUsed`, `Expired` or `Locked` when a code matches but is not
    ///   redeemable; `AlreadyUsed` also when a concurrent call consumed it first
    /// - `Unauthorized` when nothing matches; live codes of the delivery
    ///   each take a failed attempt
    pub async fn verify(
        &self,
        delivery_id: &str,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessCode> {
        let codes = self.store.access_codes_for_delivery(delivery_id).await?;

        let mut matched = None;
        for code in codes.iter() {
            if matches_hash(candidate, &code.code_hash)? {
                matched = Some(code);
                break;
            }
        }

        let Some(code) = matched else {
            for code in codes.iter().filter(|c| c.is_live(now)) {
                let updated = self.increment_attempts(&code.id).await?;
                if updated.is_locked() {
                    warn!(code_id = %code.id, delivery_id, "Access code locked");
                }
            }
            return Err(VigilError::Unauthorized("invalid access code".into()));
        };

        if code.is_used() {
            return Err(VigilError::AlreadyUsed);
        }
        if code.is_expired(now) {
            return Err(VigilError::Expired);
        }
        if code.is_locked() {
            return Err(VigilError::Locked);
        }

        if !self.mark_used(&code.id, now).await? {
            debug!(code_id = %code.id, delivery_id, "Access code consumed concurrently");
            return Err(VigilError::AlreadyUsed);
        }

        let mut used = code.clone();
        used.used_at = Some(now);
        info!(code_id = %used.id, delivery_id, "Access code redeemed");
        Ok(used)
    }

    /// Count a failed attempt; locked codes stay at their limit.
    pub async fn increment_attempts(&self, id: &str) -> Result<AccessCode> {
        self.store.add_access_code_attempt(id).await
    }

    /// Consume the code. `false` when it was already used.
    pub async fn mark_used(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.store.mark_access_code_used(id, now).await
    }

    /// Spend one recovery attempt of a redeemed code.
    ///
    /// # Errors
    ///
    /// `Locked` once `max_attempts` recoveries have been tried with it.
    pub async fn charge_answer_attempt(&self, id: &str) -> Result<AccessCode> {
        match self.store.take_answer_attempt(id).await? {
            Some(code) => Ok(code),
            None => {
                warn!(code_id = id, "Recovery attempts exhausted");
                Err(VigilError::Locked)
            }
        }
    }

    /// Delete codes past their expiry, returning how many were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired: Vec<AccessCode> = self
            .store
            .list_access_codes()
            .await?
            .into_iter()
            .filter(|c| c.is_expired(now))
            .collect();

        for code in &expired {
            self.store.delete_access_code(&code.id).await?;
        }

        if !expired.is_empty() {
            info!(removed = expired.len(), "Swept expired access codes");
        }
        Ok(expired.len())
    }
}
