//! In-flight authentication challenges.
//!
//! The identity provider (passkey/WebAuthn) issues a challenge, the client
//! answers it, and the answer is checked against the stored challenge exactly
//! once. Entries live in a process-wide map keyed by a random session id.
//!
//! - Each challenge is consumed at most once (`take` removes it)
//! - TTL enforcement (default 5 minutes) evicts abandoned ceremonies
//! - Max entries bound; oldest entry evicted when at capacity
//! - Challenge bytes are zeroized when dropped
//!
//! The map is ephemeral. Multi-instance deployments must back
//! [`ChallengeStore`] with one shared store instead of [`MemoryChallengeStore`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;
use zeroize::Zeroize;

use crate::crypto::generate_random_bytes;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the challenge store.
#[derive(Debug, Clone)]
pub struct ChallengeConfig {
    /// How long a challenge stays redeemable
    pub ttl: Duration,

    /// Maximum number of outstanding challenges
    pub max_entries: usize,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300), // 5 minutes
            max_entries: 10_000,
        }
    }
}

// =============================================================================
// Pending Challenge
// =============================================================================

/// A challenge waiting for its response.
pub struct PendingChallenge {
    /// Random challenge bytes sent to the client (sensitive)
    challenge: Vec<u8>,

    /// User the ceremony is for, if already known
    pub user_id: Option<String>,

    /// When this entry was created
    pub created_at: Instant,

    /// When this entry expires
    pub expires_at: Instant,
}

impl PendingChallenge {
    fn new(challenge: Vec<u8>, user_id: Option<String>, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            challenge,
            user_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }
}

impl Drop for PendingChallenge {
    fn drop(&mut self) {
        self.challenge.zeroize();
    }
}

/// A consumed challenge handed back to the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakenChallenge {
    pub challenge: Vec<u8>,
    pub user_id: Option<String>,
}

// =============================================================================
// Store Trait
// =============================================================================

/// Exactly-once, short-lived challenge storage.
pub trait ChallengeStore: Send + Sync {
    /// Store `challenge` under `session_id`, replacing any previous entry.
    fn insert(&self, session_id: String, challenge: Vec<u8>, user_id: Option<String>);

    /// Remove and return the challenge. `None` if missing, expired or already taken.
    fn take(&self, session_id: &str) -> Option<TakenChallenge>;

    /// Drop expired entries, returning how many were removed.
    fn cleanup(&self) -> usize;

    /// Generate a fresh session id and 32-byte challenge and store them.
    fn issue(&self, user_id: Option<String>) -> (String, Vec<u8>) {
        let session_id = hex::encode(generate_random_bytes::<16>());
        let challenge = generate_random_bytes::<32>().to_vec();
        self.insert(session_id.clone(), challenge.clone(), user_id);
        (session_id, challenge)
    }
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct ChallengeStats {
    issued: AtomicU64,
    consumed: AtomicU64,
    evictions: AtomicU64,
}

/// Snapshot of challenge store statistics.
#[derive(Debug, Clone)]
pub struct ChallengeStatsSnapshot {
    pub issued: u64,
    pub consumed: u64,
    pub evictions: u64,
}

// =============================================================================
// In-memory Store
// =============================================================================

/// `DashMap` backed challenge store for single-instance deployments.
pub struct MemoryChallengeStore {
    entries: DashMap<String, PendingChallenge>,
    config: ChallengeConfig,
    stats: ChallengeStats,
}

impl MemoryChallengeStore {
    pub fn new(config: ChallengeConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            stats: ChallengeStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChallengeConfig::default())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> ChallengeStatsSnapshot {
        ChallengeStatsSnapshot {
            issued: self.stats.issued.load(Ordering::Relaxed),
            consumed: self.stats.consumed.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }

    /// Evict the oldest entry.
    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.created_at)
            .map(|e| e.key().clone());

        if let Some(key) = oldest {
            self.entries.remove(&key);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Default for MemoryChallengeStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ChallengeStore for MemoryChallengeStore {
    fn insert(&self, session_id: String, challenge: Vec<u8>, user_id: Option<String>) {
        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(&session_id) {
            self.evict_oldest();
        }

        let entry = PendingChallenge::new(challenge, user_id, self.config.ttl);
        self.entries.insert(session_id, entry);
        self.stats.issued.fetch_add(1, Ordering::Relaxed);
    }

    fn take(&self, session_id: &str) -> Option<TakenChallenge> {
        // remove() holds the shard lock, so two concurrent takes cannot both win
        let (_, entry) = self.entries.remove(session_id)?;
        if entry.is_expired() {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!("Challenge expired before use");
            return None;
        }

        self.stats.consumed.fetch_add(1, Ordering::Relaxed);
        Some(TakenChallenge {
            challenge: entry.challenge.clone(),
            user_id: entry.user_id.clone(),
        })
    }

    fn cleanup(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, v| {
            if v.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        self.stats
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }
}

// =============================================================================
// Tests
// =============================================================================
