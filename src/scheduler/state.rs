//! Per-user check-in state and its escalation rules.
//!
//! ```text
//! Idle --(due)--> PingSent(normal|urgent|final) --(activity)--> Idle
//!                        |
//!                        +--(silence past deadline)--> DeadlineExpired --(tick)--> Triggered
//! ```
//!
//! `Triggered` is terminal for the cycle; only an explicit re-arm leaves it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::schemas::{PingRecord, PingStatus};

/// Remaining time above which a prompt is routine
pub const URGENT_THRESHOLD_HOURS: i64 = 24;

/// Remaining time below which a prompt is the final warning
pub const FINAL_WARNING_THRESHOLD_HOURS: i64 = 12;

/// How pressing an outstanding check-in is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Urgent,
    FinalWarning,
}

impl Urgency {
    /// Classify by time left until the deadline.
    pub fn from_remaining(remaining: Duration) -> Self {
        if remaining > Duration::hours(URGENT_THRESHOLD_HOURS) {
            Urgency::Normal
        } else if remaining >= Duration::hours(FINAL_WARNING_THRESHOLD_HOURS) {
            Urgency::Urgent
        } else {
            Urgency::FinalWarning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Urgent => "urgent",
            Urgency::FinalWarning => "final_warning",
        }
    }
}

/// Where a user sits in the check-in cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInPhase {
    Idle,
    PingSent(Urgency),
    DeadlineExpired,
    Triggered,
}

/// Check-in settings and activity, stored on the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInState {
    /// Whether the switch is armed
    pub enabled: bool,

    /// Last authenticated user action
    pub last_activity: DateTime<Utc>,

    /// Seconds between check-in prompts
    pub ping_frequency_secs: i64,

    /// Seconds of silence after `last_activity` before release
    pub ping_deadline_secs: i64,

    /// When the next prompt is due; unset means immediately
    #[serde(default)]
    pub next_scheduled_ping: Option<DateTime<Utc>>,

    /// Set when this cycle's release has been triggered
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,

    /// Set once every delivery of the triggered cycle has gone out
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
}

impl CheckInState {
    pub fn new(now: DateTime<Utc>, ping_frequency: Duration, ping_deadline: Duration) -> Self {
        Self {
            enabled: true,
            last_activity: now,
            ping_frequency_secs: ping_frequency.num_seconds(),
            ping_deadline_secs: ping_deadline.num_seconds(),
            next_scheduled_ping: None,
            triggered_at: None,
            released_at: None,
        }
    }

    pub fn ping_frequency(&self) -> Duration {
        Duration::seconds(self.ping_frequency_secs)
    }

    pub fn ping_deadline(&self) -> Duration {
        Duration::seconds(self.ping_deadline_secs)
    }

    /// `last_activity + ping_deadline`
    pub fn deadline(&self) -> DateTime<Utc> {
        self.last_activity + self.ping_deadline()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_scheduled_ping.map_or(true, |next| next <= now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.enabled && now > self.deadline()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered_at.is_some()
    }

    /// Triggered, with deliveries still outstanding.
    pub fn is_releasing(&self) -> bool {
        self.is_triggered() && self.released_at.is_none()
    }

    /// Start a fresh cycle at `now`.
    pub fn rearm(&mut self, now: DateTime<Utc>) {
        self.enabled = true;
        self.triggered_at = None;
        self.released_at = None;
        self.last_activity = now;
        self.next_scheduled_ping = Some(now + self.ping_frequency());
    }

    pub fn urgency(&self, now: DateTime<Utc>) -> Urgency {
        Urgency::from_remaining(self.deadline() - now)
    }

    /// Identifies the prompt cycle a due user is in. Stable across retried ticks.
    pub fn cycle_anchor(&self) -> DateTime<Utc> {
        self.next_scheduled_ping.unwrap_or(self.last_activity)
    }

    pub fn phase(&self, now: DateTime<Utc>, latest_ping: Option<&PingRecord>) -> CheckInPhase {
        if self.is_triggered() {
            return CheckInPhase::Triggered;
        }
        if self.is_expired(now) {
            return CheckInPhase::DeadlineExpired;
        }
        match latest_ping {
            Some(ping) if ping.status != PingStatus::Responded => {
                CheckInPhase::PingSent(self.urgency(now))
            }
            _ => CheckInPhase::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_urgency_boundaries() {
        assert_eq!(Urgency::from_remaining(Duration::hours(48)), Urgency::Normal);
        assert_eq!(
            Urgency::from_remaining(Duration::hours(24) + Duration::seconds(1)),
            Urgency::Normal
        );
        assert_eq!(Urgency::from_remaining(Duration::hours(24)), Urgency::Urgent);
        assert_eq!(Urgency::from_remaining(Duration::hours(12)), Urgency::Urgent);
        assert_eq!(
            Urgency::from_remaining(Duration::hours(12) - Duration::seconds(1)),
            Urgency::FinalWarning
        );
        assert_eq!(
            Urgency::from_remaining(Duration::hours(-1)),
            Urgency::FinalWarning
        );
    }

    #[test]
    fn test_due_when_unscheduled_or_past() {
        let mut state = CheckInState::new(now(), Duration::days(7), Duration::days(14));
        assert!(state.is_due(now()));

        state.next_scheduled_ping = Some(now() - Duration::seconds(1));
        assert!(state.is_due(now()));

        state.next_scheduled_ping = Some(now() + Duration::seconds(1));
        assert!(!state.is_due(now()));

        state.next_scheduled_ping = None;
        state.enabled = false;
        assert!(!state.is_due(now()));
    }

    #[test]
    fn test_deadline_expiry_edge() {
        let state = CheckInState::new(now(), Duration::days(1), Duration::days(2));
        let deadline = now() + Duration::days(2);

        assert!(!state.is_expired(deadline - Duration::seconds(1)));
        assert!(!state.is_expired(deadline));
        assert!(state.is_expired(deadline + Duration::seconds(1)));
    }

    #[test]
    fn test_disabled_never_expires() {
        let mut state = CheckInState::new(now(), Duration::days(1), Duration::days(2));
        state.enabled = false;
        assert!(!state.is_expired(now() + Duration::days(365)));
    }

    #[test]
    fn test_phase_progression() {
        let mut state = CheckInState::new(now(), Duration::days(1), Duration::days(3));
        assert_eq!(state.phase(now(), None), CheckInPhase::Idle);

        let ping = PingRecord::sent(
            "u1",
            now(),
            now(),
            "log",
            state.urgency(now()),
        );
        assert_eq!(
            state.phase(now(), Some(&ping)),
            CheckInPhase::PingSent(Urgency::Normal)
        );

        let late = now() + Duration::days(3) - Duration::hours(6);
        assert_eq!(
            state.phase(late, Some(&ping)),
            CheckInPhase::PingSent(Urgency::FinalWarning)
        );

        let after = now() + Duration::days(3) + Duration::seconds(1);
        assert_eq!(state.phase(after, Some(&ping)), CheckInPhase::DeadlineExpired);

        state.triggered_at = Some(after);
        assert_eq!(state.phase(after, Some(&ping)), CheckInPhase::Triggered);
        assert!(state.is_releasing());

        state.released_at = Some(after);
        assert!(!state.is_releasing());
    }

    #[test]
    fn test_rearm_starts_fresh_cycle() {
        let mut state = CheckInState::new(now(), Duration::days(1), Duration::days(3));
        state.triggered_at = Some(now() + Duration::days(4));
        state.released_at = Some(now() + Duration::days(4));

        let later = now() + Duration::days(5);
        state.rearm(later);
        assert!(!state.is_triggered());
        assert!(state.released_at.is_none());
        assert_eq!(state.last_activity, later);
        assert_eq!(state.next_scheduled_ping, Some(later + Duration::days(1)));
        assert_eq!(state.deadline(), later + Duration::days(3));
    }
}
