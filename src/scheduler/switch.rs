//! Polling switch scheduler
//!
//! Each tick walks every user once: expired users are triggered and handed
//! to delivery; due users get a check-in prompt; triggered users with
//! deliveries still pending are released again. A prompt is claimed by
//! creating its [`PingRecord`] (keyed by user and cycle) before anything is
//! sent, so a retried tick never double-sends.
//!
//! The tick decides from a snapshot of the users but writes only through the
//! store's targeted updates, so a check-in that lands mid-tick is never
//! overwritten and a deadline it moved is re-checked before triggering.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::db::schemas::{PingRecord, User};
use crate::db::Store;
use crate::delivery::DeliveryService;
use crate::notify::NotificationSink;
use crate::services::SecretService;
use crate::types::{Result, VigilError};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often the switch is evaluated
    pub tick_interval: Duration,

    /// How often expired access codes are deleted
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

/// Counts from one tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub pinged: usize,
    /// Due users whose cycle an earlier tick already claimed
    pub already_claimed: usize,
    pub triggered: usize,
    /// Secret links handed to recipients
    pub delivered: usize,
    /// Failed prompts, triggers and deliveries
    pub failed: usize,
}

pub struct SwitchScheduler {
    store: Arc<dyn Store>,
    sink: Arc<dyn NotificationSink>,
    delivery: Arc<DeliveryService>,
    secrets: Arc<SecretService>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl SwitchScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
        delivery: Arc<DeliveryService>,
        secrets: Arc<SecretService>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            sink,
            delivery,
            secrets,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Armed users whose next prompt is unscheduled or due by `now`.
    pub async fn users_due_for_ping(&self, now: DateTime<Utc>) -> Result<Vec<User>> {
        Ok(self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.check_in.is_due(now))
            .collect())
    }

    /// Armed users past their deadline that have not been triggered yet.
    pub async fn users_with_expired_deadline(&self, now: DateTime<Utc>) -> Result<Vec<User>> {
        Ok(self
            .store
            .list_users()
            .await?
            .into_iter()
            .filter(|u| u.check_in.is_expired(now) && !u.check_in.is_triggered())
            .collect())
    }

    /// Record an authenticated user action.
    ///
    /// Resets `last_activity`, marks an outstanding prompt as responded and
    /// moves the owner's question sets out to the new deadline. A triggered
    /// cycle stays triggered; see [`Self::rearm`].
    pub async fn record_activity(&self, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        let user = self.store.record_user_activity(user_id, now).await?;

        if let Some(ping) = self.store.latest_ping_for_user(user_id).await? {
            if ping.is_outstanding() {
                self.store.mark_ping_responded(&ping.id, now).await?;
            }
        }

        if !user.check_in.is_triggered() {
            self.secrets.sync_release_times(user_id).await?;
        }

        debug!(user_id, "Recorded activity");
        Ok(())
    }

    /// Start a new cycle after a trigger, or re-enable a disabled switch.
    pub async fn rearm(&self, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.store.rearm_user(user_id, now).await?;
        self.secrets.sync_release_times(user_id).await?;

        info!(user_id, "Switch re-armed");
        Ok(())
    }

    /// Evaluate every user once.
    ///
    /// Per-user failures are logged and counted; only a failure to list
    /// users fails the tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let mut report = TickReport::default();

        for user in self.store.list_users().await? {
            let state = &user.check_in;
            if !state.enabled {
                continue;
            }

            if state.is_triggered() {
                if state.is_releasing() {
                    self.release(&user, now, &mut report).await;
                }
            } else if state.is_expired(now) {
                match self.store.mark_triggered(&user.id, now).await {
                    Ok(Some(triggered)) => {
                        info!(
                            user_id = %triggered.id,
                            deadline = %triggered.check_in.deadline(),
                            "Deadline expired; releasing"
                        );
                        report.triggered += 1;
                        self.release(&triggered, now, &mut report).await;
                    }
                    Ok(None) => debug!(user_id = %user.id, "Deadline moved before trigger"),
                    Err(e) => {
                        warn!(user_id = %user.id, error = %e, "Failed to trigger switch");
                        report.failed += 1;
                    }
                }
            } else if state.is_due(now) {
                match self.ping(&user, now).await {
                    Ok(true) => report.pinged += 1,
                    Ok(false) => report.already_claimed += 1,
                    Err(e) => {
                        warn!(user_id = %user.id, error = %e, "Failed to send check-in prompt");
                        report.failed += 1;
                    }
                }
            }
        }

        if report != TickReport::default() {
            info!(
                pinged = report.pinged,
                already_claimed = report.already_claimed,
                triggered = report.triggered,
                delivered = report.delivered,
                failed = report.failed,
                "Switch tick"
            );
        }
        Ok(report)
    }

    /// Claim, schedule, send. Returns `false` when the cycle was already claimed.
    async fn ping(&self, user: &User, now: DateTime<Utc>) -> Result<bool> {
        let cycle = user.check_in.cycle_anchor();
        let urgency = user.check_in.urgency(now);
        let ping = PingRecord::sent(&user.id, cycle, now, &user.notify_channel, urgency);

        let claimed = match self.store.create_ping(ping.clone()).await {
            Ok(()) => true,
            Err(VigilError::Conflict(_)) => false,
            Err(e) => return Err(e),
        };

        // an earlier tick may have claimed the cycle but died before rescheduling
        self.store
            .schedule_next_ping(&user.id, now + user.check_in.ping_frequency())
            .await?;

        if !claimed {
            debug!(user_id = %user.id, ping_id = %ping.id, "Cycle already claimed");
            return Ok(false);
        }

        self.sink.send_check_in_prompt(user, urgency).await?;

        self.store.mark_ping_delivered(&ping.id).await?;
        debug!(user_id = %user.id, urgency = urgency.as_str(), "Check-in prompt delivered");
        Ok(true)
    }

    /// Run delivery for a triggered user; the cycle counts as released once
    /// nothing is left pending.
    async fn release(&self, user: &User, now: DateTime<Utc>, report: &mut TickReport) {
        let released = match self.delivery.release_for_user(user, now).await {
            Ok(released) => released,
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Release failed");
                report.failed += 1;
                return;
            }
        };

        report.delivered += released.delivered;
        report.failed += released.failed;
        if released.failed > 0 {
            return;
        }

        let Some(triggered_at) = user.check_in.triggered_at else {
            return;
        };
        match self.store.mark_released(&user.id, triggered_at, now).await {
            Ok(true) => {}
            Ok(false) => debug!(user_id = %user.id, "Re-armed during release"),
            Err(e) => warn!(user_id = %user.id, error = %e, "Failed to record release"),
        }
    }

    /// Start the tick and sweep loops.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Switch scheduler already running");
                return Ok(());
            }
            *running = true;
        }

        info!(
            "Starting switch scheduler (tick: {:?}, sweep: {:?})",
            self.config.tick_interval, self.config.sweep_interval
        );

        let scheduler = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.config.tick_interval);

            loop {
                interval.tick().await;

                if !*scheduler.running.read().await {
                    info!("Switch scheduler stopped");
                    break;
                }

                if let Err(e) = scheduler.tick(Utc::now()).await {
                    error!("Switch tick failed: {}", e);
                }
            }
        });

        let sweeper = Arc::clone(&self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweeper.config.sweep_interval);

            loop {
                interval.tick().await;

                if !*sweeper.running.read().await {
                    info!("Access code sweeper stopped");
                    break;
                }

                if let Err(e) = sweeper.delivery.codes().sweep_expired(Utc::now()).await {
                    error!("Access code sweep failed: {}", e);
                }
            }
        });

        Ok(())
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        info!("Stopping switch scheduler");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
