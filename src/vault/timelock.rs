//! Time-gated question vault.
//!
//! A question set is wrapped in a blob tagged with a release *round*. Rounds
//! count fixed periods since a genesis instant, in the style of a randomness
//! beacon chain (defaults follow drand quicknet: 3 s periods).
//!
//! # Limitation
//!
//! [`RoundGate`] enforces the gate procedurally: the blob holds the question
//! data in the clear and `unlock` refuses to decode it early. Anyone who can
//! read the stored blob and skip the check can read it. Callers depend only on
//! [`TimeGate`], so a beacon-gated encryption scheme can replace it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{Result, VigilError};

use super::question::{b64, QuestionData, QuestionSet};

/// drand quicknet genesis (2023-08-23T15:09:27Z)
pub const DEFAULT_GENESIS: i64 = 1_692_803_367;

/// drand quicknet period in seconds
pub const DEFAULT_PERIOD_SECS: u64 = 3;

/// Maps wall-clock time to rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundClock {
    genesis: DateTime<Utc>,
    period_secs: u64,
}

impl Default for RoundClock {
    fn default() -> Self {
        Self {
            genesis: Utc
                .timestamp_opt(DEFAULT_GENESIS, 0)
                .single()
                .unwrap_or_default(),
            period_secs: DEFAULT_PERIOD_SECS,
        }
    }
}

impl RoundClock {
    pub fn new(genesis: DateTime<Utc>, period_secs: u64) -> Result<Self> {
        if period_secs == 0 {
            return Err(VigilError::Config("round period must be positive".into()));
        }
        Ok(Self { genesis, period_secs })
    }

    /// Round in progress at `at`. Round 1 starts at genesis; earlier times are round 0.
    pub fn round_at(&self, at: DateTime<Utc>) -> u64 {
        let elapsed = (at - self.genesis).num_seconds();
        if elapsed < 0 {
            return 0;
        }
        elapsed as u64 / self.period_secs + 1
    }

    /// First instant of `round`.
    pub fn round_start(&self, round: u64) -> DateTime<Utc> {
        let offset = round.saturating_sub(1).saturating_mul(self.period_secs);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        self.genesis
            .checked_add_signed(chrono::Duration::seconds(offset))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// First round that starts at or after `at`, so a gate never opens early.
    pub fn release_round(&self, at: DateTime<Utc>) -> u64 {
        let round = self.round_at(at);
        if self.round_start(round) < at {
            round + 1
        } else {
            round.max(1)
        }
    }

    pub fn current_round(&self) -> u64 {
        self.round_at(Utc::now())
    }
}

/// Lock/unlock seam for recovery-question vaults.
pub trait TimeGate: Send + Sync {
    /// Wrap `data` so it cannot be read before `release_at`.
    fn lock(&self, data: &QuestionData, release_at: DateTime<Utc>) -> Result<QuestionSet>;

    /// Open a set as of `now`, failing with `TimelockNotReady` while the gate is closed.
    fn unlock_at(&self, set: &QuestionSet, now: DateTime<Utc>) -> Result<QuestionData>;

    /// Move the release point of an existing set.
    ///
    /// Needs full re-encryption; gates that cannot read their own sealed
    /// blobs return `Validation` and callers must re-seal from source.
    fn relock(&self, set: &QuestionSet, release_at: DateTime<Utc>) -> Result<QuestionSet>;

    /// Round a set locked for `release_at` would target.
    fn release_round(&self, release_at: DateTime<Utc>) -> u64;

    /// Open a set as of the current time.
    fn unlock(&self, set: &QuestionSet) -> Result<QuestionData> {
        self.unlock_at(set, Utc::now())
    }
}

/// Serialized blob: `{round, data}`.
#[derive(Serialize, Deserialize)]
struct GatedBlob {
    round: u64,
    #[serde(with = "b64")]
    data: Vec<u8>,
}

/// Server-enforced round gate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundGate {
    clock: RoundClock,
}

impl RoundGate {
    pub fn new(clock: RoundClock) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &RoundClock {
        &self.clock
    }

    fn parse(set: &QuestionSet) -> Result<GatedBlob> {
        let blob: GatedBlob = serde_json::from_slice(&set.blob)?;
        if blob.round != set.target_round {
            return Err(VigilError::Format(format!(
                "blob round {} does not match target round {}",
                blob.round, set.target_round
            )));
        }
        Ok(blob)
    }

    fn decode(blob: &GatedBlob) -> Result<QuestionData> {
        Ok(serde_json::from_slice(&blob.data)?)
    }
}

impl TimeGate for RoundGate {
    fn lock(&self, data: &QuestionData, release_at: DateTime<Utc>) -> Result<QuestionSet> {
        let round = self.clock.release_round(release_at);
        let blob = GatedBlob {
            round,
            data: serde_json::to_vec(data)?,
        };

        debug!(round, questions = data.questions.len(), "Locked question set");
        Ok(QuestionSet {
            threshold: data.threshold,
            total: data.questions.len(),
            target_round: round,
            blob: serde_json::to_vec(&blob)?,
        })
    }

    fn unlock_at(&self, set: &QuestionSet, now: DateTime<Utc>) -> Result<QuestionData> {
        let blob = Self::parse(set)?;
        let current_round = self.clock.round_at(now);
        if current_round < blob.round {
            return Err(VigilError::TimelockNotReady {
                target_round: blob.round,
                current_round,
            });
        }
        Self::decode(&blob)
    }

    fn relock(&self, set: &QuestionSet, release_at: DateTime<Utc>) -> Result<QuestionSet> {
        let blob = Self::parse(set)?;
        let data = Self::decode(&blob)?;
        self.lock(&data, release_at)
    }

    fn release_round(&self, release_at: DateTime<Utc>) -> u64 {
        self.clock.release_round(release_at)
    }
}
