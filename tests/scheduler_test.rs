//! Switch scheduler integration tests
//!
//! Drives ticks with explicit timestamps against the in-memory store and a
//! recording notification sink.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tokio_test::{assert_err, assert_ok};

use common::{t0, test_app, test_args};
use vigil::db::schemas::{PingRecord, PingStatus, Recipient, User};
use vigil::db::{MemoryStore, Store};
use vigil::notify::NotificationSink;
use vigil::scheduler::{TickReport, Urgency};
use vigil::App;

async fn register(app: &App, name: &str) -> User {
    app.register_user(
        name,
        "correct horse",
        "log",
        &format!("{name}@example.com"),
        t0(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_first_tick_pings_and_reschedules() {
    let (app, sink) = test_app();
    let alice = register(&app, "alice").await;

    let report = app.scheduler.tick(t0()).await.unwrap();
    assert_eq!(report.pinged, 1);
    assert_eq!(
        sink.prompts().await,
        vec![("alice@example.com".to_string(), Urgency::Normal)]
    );

    let stored = app.store.get_user(&alice.id).await.unwrap();
    assert_eq!(stored.check_in.next_scheduled_ping, Some(t0() + Duration::hours(24)));

    let ping = app.store.latest_ping_for_user(&alice.id).await.unwrap().unwrap();
    assert_eq!(ping.status, PingStatus::Delivered);
    assert_eq!(ping.cycle, t0());
}

#[tokio::test]
async fn test_repeated_tick_does_not_double_send() {
    let (app, sink) = test_app();
    register(&app, "alice").await;

    app.scheduler.tick(t0()).await.unwrap();
    let again = app.scheduler.tick(t0() + Duration::minutes(1)).await.unwrap();

    assert_eq!(again, TickReport::default());
    assert_eq!(sink.prompts().await.len(), 1);
}

#[tokio::test]
async fn test_claimed_cycle_is_skipped() {
    let (app, sink) = test_app();
    let alice = register(&app, "alice").await;

    // an earlier tick claimed this cycle and died before rescheduling
    let claim = PingRecord::sent(
        &alice.id,
        alice.check_in.cycle_anchor(),
        t0(),
        "log",
        Urgency::Normal,
    );
    app.store.create_ping(claim).await.unwrap();

    let report = app.scheduler.tick(t0()).await.unwrap();
    assert_eq!(report.already_claimed, 1);
    assert_eq!(report.pinged, 0);
    assert!(sink.prompts().await.is_empty());

    let stored = app.store.get_user(&alice.id).await.unwrap();
    assert_eq!(stored.check_in.next_scheduled_ping, Some(t0() + Duration::hours(24)));
}

#[tokio::test]
async fn test_failed_send_does_not_block_other_users() {
    let (app, sink) = test_app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    sink.fail_for("alice@example.com").await;

    let report = app.scheduler.tick(t0()).await.unwrap();
    assert_eq!(report.pinged, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(
        sink.prompts().await,
        vec![("bob@example.com".to_string(), Urgency::Normal)]
    );

    let alice_ping = app.store.latest_ping_for_user(&alice.id).await.unwrap().unwrap();
    assert_eq!(alice_ping.status, PingStatus::Sent);
    let bob_ping = app.store.latest_ping_for_user(&bob.id).await.unwrap().unwrap();
    assert_eq!(bob_ping.status, PingStatus::Delivered);
}

#[tokio::test]
async fn test_urgency_escalates_towards_deadline() {
    let (app, sink) = test_app();
    register(&app, "alice").await;

    for hours in [0, 24, 48, 72] {
        app.scheduler.tick(t0() + Duration::hours(hours)).await.unwrap();
    }

    let urgencies: Vec<Urgency> = sink.prompts().await.into_iter().map(|(_, u)| u).collect();
    assert_eq!(
        urgencies,
        vec![
            Urgency::Normal,
            Urgency::Normal,
            Urgency::Urgent,
            Urgency::FinalWarning
        ]
    );
}

#[tokio::test]
async fn test_expiry_boundary() {
    let (app, _) = test_app();
    let alice = register(&app, "alice").await;
    let deadline = t0() + Duration::hours(72);

    let before = app
        .scheduler
        .users_with_expired_deadline(deadline - Duration::seconds(1))
        .await
        .unwrap();
    assert!(before.is_empty());

    let after = app
        .scheduler
        .users_with_expired_deadline(deadline + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, alice.id);

    // still due by schedule; tick triggers instead of prompting
    let due = app
        .scheduler
        .users_due_for_ping(deadline + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);

    let report = app.scheduler.tick(deadline + Duration::seconds(1)).await.unwrap();
    assert_eq!(report.triggered, 1);
    assert_eq!(report.pinged, 0);
}

#[tokio::test]
async fn test_due_for_ping_follows_schedule() {
    let (app, _) = test_app();
    let alice = register(&app, "alice").await;
    let due_ids = |users: Vec<User>| users.into_iter().map(|u| u.id).collect::<Vec<_>>();

    // never prompted: due at once
    assert_eq!(
        due_ids(app.scheduler.users_due_for_ping(t0()).await.unwrap()),
        vec![alice.id.clone()]
    );

    app.scheduler.tick(t0()).await.unwrap();
    assert!(app
        .scheduler
        .users_due_for_ping(t0() + Duration::hours(1))
        .await
        .unwrap()
        .is_empty());

    let next_due = t0() + Duration::hours(24);
    assert_eq!(
        due_ids(app.scheduler.users_due_for_ping(next_due).await.unwrap()),
        vec![alice.id.clone()]
    );

    // answer and get prompted for the next cycle
    app.scheduler
        .record_activity(&alice.id, next_due)
        .await
        .unwrap();
    app.scheduler.tick(next_due).await.unwrap();
    assert!(app
        .scheduler
        .users_due_for_ping(next_due + Duration::minutes(1))
        .await
        .unwrap()
        .is_empty());

    // a disabled switch is never due
    let mut stored = app.store.get_user(&alice.id).await.unwrap();
    stored.check_in.enabled = false;
    app.store.update_user(stored).await.unwrap();
    assert!(app
        .scheduler
        .users_due_for_ping(next_due + Duration::days(30))
        .await
        .unwrap()
        .is_empty());
}

/// Records a check-in for one user while the first prompt of a tick is out.
struct CheckInDuringSend {
    store: Arc<dyn Store>,
    user_id: Mutex<Option<String>>,
    at: DateTime<Utc>,
}

#[async_trait]
impl NotificationSink for CheckInDuringSend {
    async fn send_check_in_prompt(&self, _user: &User, _urgency: Urgency) -> vigil::Result<()> {
        if let Some(id) = self.user_id.lock().await.take() {
            self.store.record_user_activity(&id, self.at).await?;
        }
        Ok(())
    }

    async fn deliver_secret(&self, _recipient: &Recipient, _link: &str) -> vigil::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_check_in_during_tick_is_kept() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let seen = t0() + Duration::hours(10);
    let sink = Arc::new(CheckInDuringSend {
        store: store.clone(),
        user_id: Mutex::new(None),
        at: seen,
    });
    let app = App::with_parts(test_args(), store, sink.clone()).unwrap();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    *sink.user_id.lock().await = Some(bob.id.clone());

    let report = app.scheduler.tick(t0()).await.unwrap();
    assert_eq!(report.pinged, 2);

    let stored = app.store.get_user(&bob.id).await.unwrap();
    assert_eq!(stored.check_in.last_activity, seen);
    assert_eq!(stored.check_in.next_scheduled_ping, Some(t0() + Duration::hours(24)));

    let expired = app
        .scheduler
        .users_with_expired_deadline(t0() + Duration::hours(72) + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, alice.id);
}

#[tokio::test]
async fn test_activity_marks_prompt_responded_and_moves_deadline() {
    let (app, _) = test_app();
    let alice = register(&app, "alice").await;
    app.scheduler.tick(t0()).await.unwrap();

    let seen = t0() + Duration::hours(30);
    assert_ok!(app.scheduler.record_activity(&alice.id, seen).await);

    let ping = app.store.latest_ping_for_user(&alice.id).await.unwrap().unwrap();
    assert_eq!(ping.status, PingStatus::Responded);
    assert_eq!(ping.responded_at, Some(seen));

    let old_deadline = t0() + Duration::hours(72);
    let expired = app
        .scheduler
        .users_with_expired_deadline(old_deadline + Duration::seconds(1))
        .await
        .unwrap();
    assert!(expired.is_empty());
}

#[tokio::test]
async fn test_trigger_is_terminal_until_rearm() {
    let (app, sink) = test_app();
    let alice = register(&app, "alice").await;
    let expired_at = t0() + Duration::hours(72) + Duration::seconds(1);

    let first = app.scheduler.tick(expired_at).await.unwrap();
    assert_eq!(first.triggered, 1);
    let second = app.scheduler.tick(expired_at + Duration::hours(1)).await.unwrap();
    assert_eq!(second.triggered, 0);

    let stored = app.store.get_user(&alice.id).await.unwrap();
    assert_eq!(stored.check_in.triggered_at, Some(expired_at));

    // signing in does not undo a trigger
    app.scheduler
        .record_activity(&alice.id, expired_at + Duration::hours(2))
        .await
        .unwrap();
    assert!(app.store.get_user(&alice.id).await.unwrap().check_in.is_triggered());

    let rearmed_at = expired_at + Duration::hours(3);
    app.scheduler.rearm(&alice.id, rearmed_at).await.unwrap();
    let stored = app.store.get_user(&alice.id).await.unwrap();
    assert!(!stored.check_in.is_triggered());
    assert_eq!(stored.check_in.last_activity, rearmed_at);

    let prompts_before = sink.prompts().await.len();
    let report = app.scheduler.tick(rearmed_at + Duration::hours(24)).await.unwrap();
    assert_eq!(report.pinged, 1);
    assert_eq!(sink.prompts().await.len(), prompts_before + 1);
}

#[tokio::test]
async fn test_unknown_user_activity_is_not_found() {
    let (app, _) = test_app();
    assert_err!(app.scheduler.record_activity("nobody", t0()).await);
}

#[tokio::test]
async fn test_start_stop() {
    let (app, _) = test_app();
    let scheduler = app.scheduler.clone();

    assert!(!scheduler.is_running().await);
    scheduler.clone().start().await.unwrap();
    assert!(scheduler.is_running().await);

    // second start is a no-op
    scheduler.clone().start().await.unwrap();
    assert!(scheduler.is_running().await);

    scheduler.stop().await;
    assert!(!scheduler.is_running().await);
}
