//! Configuration for Vigil
//!
//! CLI arguments and environment variable handling using clap.

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::auth::ChallengeConfig;
use crate::crypto::KdfParams;
use crate::delivery::AccessCodeConfig;
use crate::scheduler::SchedulerConfig;
use crate::types::{Result, VigilError};
use crate::vault::timelock::{DEFAULT_GENESIS, DEFAULT_PERIOD_SECS};
use crate::vault::RoundClock;

/// Upper bound for every hour-valued setting (ten years)
pub const MAX_PERIOD_HOURS: i64 = 24 * 365 * 10;

/// Vigil - dead man's switch for secrets
#[derive(Parser, Debug, Clone)]
#[command(name = "vigil")]
#[command(about = "Releases secrets to recipients when their owner stops checking in")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Seconds between switch evaluations
    #[arg(long, env = "TICK_INTERVAL_SECS", default_value = "60")]
    pub tick_interval_secs: u64,

    /// Seconds between expired access code sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "3600")]
    pub sweep_interval_secs: u64,

    /// Check-in prompt frequency for new users, in hours
    #[arg(long, env = "DEFAULT_PING_FREQUENCY_HOURS", default_value = "168")]
    pub default_ping_frequency_hours: i64,

    /// Silence allowed before release for new users, in hours
    #[arg(long, env = "DEFAULT_PING_DEADLINE_HOURS", default_value = "336")]
    pub default_ping_deadline_hours: i64,

    /// Access code lifetime in hours
    #[arg(long, env = "ACCESS_CODE_TTL_HOURS", default_value = "168")]
    pub access_code_ttl_hours: i64,

    /// Failed attempts before an access code locks
    #[arg(long, env = "ACCESS_CODE_MAX_ATTEMPTS", default_value = "5")]
    pub access_code_max_attempts: u32,

    /// Authentication challenge lifetime in seconds
    #[arg(long, env = "CHALLENGE_TTL_SECS", default_value = "300")]
    pub challenge_ttl_secs: u64,

    /// Maximum outstanding authentication challenges
    #[arg(long, env = "CHALLENGE_MAX_ENTRIES", default_value = "10000")]
    pub challenge_max_entries: usize,

    /// Unix time of round 1 for the time gate
    #[arg(long, env = "ROUND_GENESIS", default_value_t = DEFAULT_GENESIS)]
    pub round_genesis: i64,

    /// Seconds per time-gate round
    #[arg(long, env = "ROUND_PERIOD_SECS", default_value_t = DEFAULT_PERIOD_SECS)]
    pub round_period_secs: u64,

    /// Base URL access links point at
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8080")]
    pub public_base_url: String,

    /// Webhook endpoint for the "webhook" channel (optional)
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in milliseconds
    #[arg(long, env = "WEBHOOK_TIMEOUT_MS", default_value = "10000")]
    pub webhook_timeout_ms: u64,

    /// Argon2 memory cost in KiB for secret envelopes
    #[arg(long, env = "KDF_MEMORY_KIB", default_value = "65536")]
    pub kdf_memory_kib: u32,

    /// Argon2 passes for secret envelopes
    #[arg(long, env = "KDF_ITERATIONS", default_value = "3")]
    pub kdf_iterations: u32,

    /// Argon2 lanes for secret envelopes
    #[arg(long, env = "KDF_PARALLELISM", default_value = "4")]
    pub kdf_parallelism: u32,
}

impl Args {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.kdf_params().validate()?;

        if self.tick_interval_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(VigilError::Config(
                "TICK_INTERVAL_SECS and SWEEP_INTERVAL_SECS must be positive".into(),
            ));
        }
        for (name, hours) in [
            ("DEFAULT_PING_FREQUENCY_HOURS", self.default_ping_frequency_hours),
            ("DEFAULT_PING_DEADLINE_HOURS", self.default_ping_deadline_hours),
            ("ACCESS_CODE_TTL_HOURS", self.access_code_ttl_hours),
        ] {
            if !(1..=MAX_PERIOD_HOURS).contains(&hours) {
                return Err(VigilError::Config(format!(
                    "{name} must be between 1 and {MAX_PERIOD_HOURS}"
                )));
            }
        }
        if self.access_code_max_attempts == 0 {
            return Err(VigilError::Config(
                "ACCESS_CODE_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.challenge_ttl_secs == 0 || self.challenge_max_entries == 0 {
            return Err(VigilError::Config(
                "CHALLENGE_TTL_SECS and CHALLENGE_MAX_ENTRIES must be positive".into(),
            ));
        }
        if !self.public_base_url.starts_with("http://") && !self.public_base_url.starts_with("https://") {
            return Err(VigilError::Config(
                "PUBLIC_BASE_URL must be an http(s) URL".into(),
            ));
        }
        self.round_clock()?;

        Ok(())
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
            parallelism: self.kdf_parallelism,
        }
    }

    pub fn round_clock(&self) -> Result<RoundClock> {
        let genesis = DateTime::<Utc>::from_timestamp(self.round_genesis, 0)
            .ok_or_else(|| VigilError::Config("ROUND_GENESIS is out of range".into()))?;
        RoundClock::new(genesis, self.round_period_secs)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: std::time::Duration::from_secs(self.tick_interval_secs),
            sweep_interval: std::time::Duration::from_secs(self.sweep_interval_secs),
        }
    }

    pub fn access_code_config(&self) -> AccessCodeConfig {
        AccessCodeConfig {
            ttl: chrono::Duration::hours(self.access_code_ttl_hours),
            max_attempts: self.access_code_max_attempts,
        }
    }

    pub fn challenge_config(&self) -> ChallengeConfig {
        ChallengeConfig {
            ttl: std::time::Duration::from_secs(self.challenge_ttl_secs),
            max_entries: self.challenge_max_entries,
        }
    }

    pub fn default_ping_frequency(&self) -> chrono::Duration {
        chrono::Duration::hours(self.default_ping_frequency_hours)
    }

    pub fn default_ping_deadline(&self) -> chrono::Duration {
        chrono::Duration::hours(self.default_ping_deadline_hours)
    }

    pub fn webhook_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.webhook_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["vigil"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = args(&[]);
        assert!(args.validate().is_ok());
        assert_eq!(args.kdf_params(), KdfParams::default());
        assert_eq!(args.access_code_config().max_attempts, 5);
        assert_eq!(args.access_code_config().ttl, chrono::Duration::days(7));
        assert_eq!(args.challenge_config().max_entries, 10_000);
        assert_eq!(args.default_ping_deadline(), chrono::Duration::days(14));
    }

    #[test]
    fn test_weak_kdf_rejected() {
        let args = args(&["--kdf-memory-kib", "1024"]);
        assert!(matches!(args.validate(), Err(VigilError::Config(_))));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let args = args(&["--access-code-max-attempts", "0"]);
        assert!(matches!(args.validate(), Err(VigilError::Config(_))));
    }

    #[test]
    fn test_zero_round_period_rejected() {
        let args = args(&["--round-period-secs", "0"]);
        assert!(matches!(args.validate(), Err(VigilError::Config(_))));
    }

    #[test]
    fn test_hour_settings_are_bounded() {
        for flag in [
            "--default-ping-frequency-hours",
            "--default-ping-deadline-hours",
            "--access-code-ttl-hours",
        ] {
            assert!(matches!(args(&[flag, "0"]).validate(), Err(VigilError::Config(_))));
            assert!(matches!(
                args(&[flag, "9000000000000000"]).validate(),
                Err(VigilError::Config(_))
            ));
        }
        assert!(args(&["--default-ping-deadline-hours", "87600"]).validate().is_ok());
    }

    #[test]
    fn test_base_url_must_be_http() {
        let args = args(&["--public-base-url", "vigil.example"]);
        assert!(matches!(args.validate(), Err(VigilError::Config(_))));
    }
}
