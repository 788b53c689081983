//! In-memory [`Store`] backed by one `RwLock<HashMap>` per table.
//!
//! Nothing survives a restart. Intended for tests and single-process runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::schemas::{
    AccessCode, Delivery, DeliveryStatus, PingRecord, PingStatus, Recipient, Secret,
    SecretAssignment, User,
};
use crate::db::{Record, Store};
use crate::types::{Result, VigilError};

/// A typed table keyed by record id.
struct Table<T: Record> {
    rows: RwLock<HashMap<String, T>>,
}

impl<T: Record> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Record> Table<T> {
    async fn insert(&self, item: T) -> Result<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(item.id()) {
            return Err(VigilError::Conflict(format!(
                "{} {} already exists",
                T::TABLE,
                item.id()
            )));
        }
        debug!(table = T::TABLE, id = item.id(), "Inserted record");
        rows.insert(item.id().to_string(), item);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<T> {
        self.rows
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| not_found::<T>(id))
    }

    async fn update(&self, item: T) -> Result<()> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(item.id()) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(not_found::<T>(item.id())),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.rows
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found::<T>(id))
    }

    /// Apply `f` to the stored row under the write lock.
    async fn modify<R>(&self, id: &str, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        let mut rows = self.rows.write().await;
        let item = rows.get_mut(id).ok_or_else(|| not_found::<T>(id))?;
        Ok(f(item))
    }

    async fn find_many(&self, filter: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .read()
            .await
            .values()
            .filter(|item| filter(item))
            .cloned()
            .collect()
    }
}

fn not_found<T: Record>(id: &str) -> VigilError {
    VigilError::NotFound(format!("{} {}", T::TABLE, id))
}

#[derive(Default)]
pub struct MemoryStore {
    users: Table<User>,
    secrets: Table<Secret>,
    recipients: Table<Recipient>,
    assignments: Table<SecretAssignment>,
    pings: Table<PingRecord>,
    access_codes: Table<AccessCode>,
    deliveries: Table<Delivery>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> Result<()> {
        if self.find_user_by_identifier(&user.identifier).await?.is_some() {
            return Err(VigilError::Conflict(format!(
                "identifier {} is taken",
                user.identifier
            )));
        }
        self.users.insert(user).await
    }

    async fn get_user(&self, id: &str) -> Result<User> {
        self.users.get(id).await
    }

    async fn update_user(&self, user: User) -> Result<()> {
        self.users.update(user).await
    }

    async fn delete_user(&self, id: &str) -> Result<()> {
        self.users.delete(id).await
    }

    async fn find_user_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .find_many(|u| u.identifier == identifier)
            .await
            .into_iter()
            .next())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.find_many(|_| true).await)
    }

    async fn record_user_activity(&self, id: &str, at: DateTime<Utc>) -> Result<User> {
        self.users
            .modify(id, |u| {
                u.check_in.last_activity = at;
                u.clone()
            })
            .await
    }

    async fn schedule_next_ping(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.users
            .modify(id, |u| u.check_in.next_scheduled_ping = Some(at))
            .await
    }

    async fn mark_triggered(&self, id: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        self.users
            .modify(id, |u| {
                let state = &mut u.check_in;
                if !state.is_expired(now) || state.is_triggered() {
                    return None;
                }
                state.triggered_at = Some(now);
                state.released_at = None;
                Some(u.clone())
            })
            .await
    }

    async fn mark_released(
        &self,
        id: &str,
        triggered_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        self.users
            .modify(id, |u| {
                let state = &mut u.check_in;
                if state.triggered_at != Some(triggered_at) {
                    return false;
                }
                state.released_at = Some(at);
                true
            })
            .await
    }

    async fn rearm_user(&self, id: &str, now: DateTime<Utc>) -> Result<User> {
        self.users
            .modify(id, |u| {
                u.check_in.rearm(now);
                u.clone()
            })
            .await
    }

    async fn create_secret(&self, secret: Secret) -> Result<()> {
        self.secrets.insert(secret).await
    }

    async fn get_secret(&self, id: &str) -> Result<Secret> {
        self.secrets.get(id).await
    }

    async fn update_secret(&self, secret: Secret) -> Result<()> {
        self.secrets.update(secret).await
    }

    async fn delete_secret(&self, id: &str) -> Result<()> {
        self.secrets.delete(id).await
    }

    async fn secrets_for_owner(&self, owner_id: &str) -> Result<Vec<Secret>> {
        let mut secrets = self.secrets.find_many(|s| s.owner_id == owner_id).await;
        secrets.sort_by_key(|s| s.created_at);
        Ok(secrets)
    }

    async fn create_recipient(&self, recipient: Recipient) -> Result<()> {
        self.recipients.insert(recipient).await
    }

    async fn get_recipient(&self, id: &str) -> Result<Recipient> {
        self.recipients.get(id).await
    }

    async fn update_recipient(&self, recipient: Recipient) -> Result<()> {
        self.recipients.update(recipient).await
    }

    async fn delete_recipient(&self, id: &str) -> Result<()> {
        self.recipients.delete(id).await
    }

    async fn create_assignment(&self, assignment: SecretAssignment) -> Result<()> {
        self.assignments.insert(assignment).await
    }

    async fn get_assignment(&self, id: &str) -> Result<SecretAssignment> {
        self.assignments.get(id).await
    }

    async fn update_assignment(&self, assignment: SecretAssignment) -> Result<()> {
        self.assignments.update(assignment).await
    }

    async fn delete_assignment(&self, id: &str) -> Result<()> {
        self.assignments.delete(id).await
    }

    async fn assignments_for_secret(&self, secret_id: &str) -> Result<Vec<SecretAssignment>> {
        Ok(self
            .assignments
            .find_many(|a| a.secret_id == secret_id)
            .await)
    }

    async fn create_ping(&self, ping: PingRecord) -> Result<()> {
        self.pings.insert(ping).await
    }

    async fn get_ping(&self, id: &str) -> Result<PingRecord> {
        self.pings.get(id).await
    }

    async fn update_ping(&self, ping: PingRecord) -> Result<()> {
        self.pings.update(ping).await
    }

    async fn latest_ping_for_user(&self, user_id: &str) -> Result<Option<PingRecord>> {
        Ok(self
            .pings
            .find_many(|p| p.user_id == user_id)
            .await
            .into_iter()
            .max_by_key(|p| (p.sent_at, p.cycle)))
    }

    async fn mark_ping_delivered(&self, id: &str) -> Result<bool> {
        self.pings
            .modify(id, |p| {
                if p.status != PingStatus::Sent {
                    return false;
                }
                p.status = PingStatus::Delivered;
                true
            })
            .await
    }

    async fn mark_ping_responded(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        self.pings
            .modify(id, |p| {
                if !p.is_outstanding() {
                    return false;
                }
                p.status = PingStatus::Responded;
                p.responded_at = Some(at);
                true
            })
            .await
    }

    async fn create_access_code(&self, code: AccessCode) -> Result<()> {
        self.access_codes.insert(code).await
    }

    async fn get_access_code(&self, id: &str) -> Result<AccessCode> {
        self.access_codes.get(id).await
    }

    async fn update_access_code(&self, code: AccessCode) -> Result<()> {
        self.access_codes.update(code).await
    }

    async fn delete_access_code(&self, id: &str) -> Result<()> {
        self.access_codes.delete(id).await
    }

    async fn access_codes_for_delivery(&self, delivery_id: &str) -> Result<Vec<AccessCode>> {
        let mut codes = self
            .access_codes
            .find_many(|c| c.delivery_id == delivery_id)
            .await;
        codes.sort_by_key(|c| c.created_at);
        Ok(codes)
    }

    async fn list_access_codes(&self) -> Result<Vec<AccessCode>> {
        Ok(self.access_codes.find_many(|_| true).await)
    }

    async fn mark_access_code_used(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        self.access_codes
            .modify(id, |c| {
                if c.is_used() {
                    return false;
                }
                c.used_at = Some(at);
                true
            })
            .await
    }

    async fn add_access_code_attempt(&self, id: &str) -> Result<AccessCode> {
        self.access_codes
            .modify(id, |c| {
                if !c.is_locked() {
                    c.attempt_count = c.attempt_count.saturating_add(1);
                }
                c.clone()
            })
            .await
    }

    async fn take_answer_attempt(&self, id: &str) -> Result<Option<AccessCode>> {
        self.access_codes
            .modify(id, |c| {
                if c.answers_exhausted() {
                    return None;
                }
                c.answer_attempts += 1;
                Some(c.clone())
            })
            .await
    }

    async fn create_delivery(&self, delivery: Delivery) -> Result<()> {
        self.deliveries.insert(delivery).await
    }

    async fn get_delivery(&self, id: &str) -> Result<Delivery> {
        self.deliveries.get(id).await
    }

    async fn add_delivery_attempt(&self, id: &str) -> Result<Delivery> {
        self.deliveries
            .modify(id, |d| {
                d.attempts = d.attempts.saturating_add(1);
                d.clone()
            })
            .await
    }

    async fn mark_delivery_sent(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.deliveries
            .modify(id, |d| {
                d.status = DeliveryStatus::Delivered;
                d.delivered_at = Some(at);
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{CheckInState, Urgency};
    use chrono::{Duration, Utc};

    fn user(identifier: &str) -> User {
        User::new(
            identifier.into(),
            "$argon2id$stub".into(),
            CheckInState::new(Utc::now(), Duration::days(7), Duration::days(14)),
            format!("{identifier}@example.com"),
        )
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let store = MemoryStore::new();
        let mut alice = user("alice");
        store.create_user(alice.clone()).await.unwrap();

        assert_eq!(store.get_user(&alice.id).await.unwrap().identifier, "alice");

        alice.notify_address = "new@example.com".into();
        store.update_user(alice.clone()).await.unwrap();
        assert_eq!(
            store.get_user(&alice.id).await.unwrap().notify_address,
            "new@example.com"
        );

        store.delete_user(&alice.id).await.unwrap();
        assert!(matches!(
            store.get_user(&alice.id).await,
            Err(VigilError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_create_is_conflict() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ping = PingRecord::sent("u1", now, now, "log", Urgency::Normal);

        store.create_ping(ping.clone()).await.unwrap();
        assert!(matches!(
            store.create_ping(ping).await,
            Err(VigilError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_identifier_is_unique() {
        let store = MemoryStore::new();
        store.create_user(user("bob")).await.unwrap();
        assert!(matches!(
            store.create_user(user("bob")).await,
            Err(VigilError::Conflict(_))
        ));
        assert!(store.find_user_by_identifier("bob").await.unwrap().is_some());
        assert!(store.find_user_by_identifier("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_user(user("ghost")).await,
            Err(VigilError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_secret("nope").await,
            Err(VigilError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_latest_ping_for_user() {
        let store = MemoryStore::new();
        let t0 = Utc::now();
        let t1 = t0 + Duration::hours(1);

        store
            .create_ping(PingRecord::sent("u1", t0, t0, "log", Urgency::Normal))
            .await
            .unwrap();
        store
            .create_ping(PingRecord::sent("u1", t1, t1, "log", Urgency::Urgent))
            .await
            .unwrap();
        store
            .create_ping(PingRecord::sent("u2", t1, t1, "log", Urgency::Normal))
            .await
            .unwrap();

        let latest = store.latest_ping_for_user("u1").await.unwrap().unwrap();
        assert_eq!(latest.cycle, t1);
        assert!(store.latest_ping_for_user("u3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_targeted_updates_keep_other_fields() {
        let store = MemoryStore::new();
        let alice = user("alice");
        store.create_user(alice.clone()).await.unwrap();

        // a writer holding a stale copy only touches the field it names
        let seen = alice.check_in.last_activity + Duration::hours(10);
        store.record_user_activity(&alice.id, seen).await.unwrap();
        let next = alice.check_in.last_activity + Duration::days(7);
        store.schedule_next_ping(&alice.id, next).await.unwrap();

        let stored = store.get_user(&alice.id).await.unwrap();
        assert_eq!(stored.check_in.last_activity, seen);
        assert_eq!(stored.check_in.next_scheduled_ping, Some(next));
    }

    #[tokio::test]
    async fn test_mark_triggered_rechecks_stored_deadline() {
        let store = MemoryStore::new();
        let alice = user("alice");
        store.create_user(alice.clone()).await.unwrap();
        let late = alice.check_in.deadline() + Duration::seconds(1);

        // a check-in landed after the caller decided alice had expired
        store.record_user_activity(&alice.id, late).await.unwrap();
        assert!(store.mark_triggered(&alice.id, late).await.unwrap().is_none());

        let later = late + Duration::days(15);
        let triggered = store.mark_triggered(&alice.id, later).await.unwrap().unwrap();
        assert_eq!(triggered.check_in.triggered_at, Some(later));
        assert!(store.mark_triggered(&alice.id, later).await.unwrap().is_none());

        assert!(!store
            .mark_released(&alice.id, late, later)
            .await
            .unwrap());
        assert!(store
            .mark_released(&alice.id, later, later)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_access_code_used_at_most_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let code = AccessCode::new(
            "r1".into(),
            "d1".into(),
            "a1".into(),
            "$argon2id$stub".into(),
            now + Duration::days(1),
            2,
            now,
        );
        store.create_access_code(code.clone()).await.unwrap();

        assert!(store.mark_access_code_used(&code.id, now).await.unwrap());
        assert!(!store.mark_access_code_used(&code.id, now).await.unwrap());

        assert!(store.take_answer_attempt(&code.id).await.unwrap().is_some());
        assert!(store.take_answer_attempt(&code.id).await.unwrap().is_some());
        assert!(store.take_answer_attempt(&code.id).await.unwrap().is_none());

        for _ in 0..3 {
            store.add_access_code_attempt(&code.id).await.unwrap();
        }
        assert_eq!(store.get_access_code(&code.id).await.unwrap().attempt_count, 2);
    }
}
