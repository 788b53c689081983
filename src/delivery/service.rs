//! Release of an owner's secrets once their switch fires.
//!
//! ```text
//! release_for_user: secrets -> assignments -> Delivery + AccessCode -> link to recipient
//! redeem:           code -> question texts
//! recover:          answers -> secret
//! ```
//!
//! A delivery row is created `Pending` and marked `Delivered` only after the
//! link has been handed to the sink. Re-running a release retries pending
//! rows with a fresh code and skips delivered ones.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::AccessCodeService;
use crate::db::schemas::{Delivery, SecretAssignment, User};
use crate::db::Store;
use crate::notify::NotificationSink;
use crate::recovery;
use crate::types::{Result, VigilError};
use crate::vault::{QuestionSet, TimeGate};

/// `"{base_url}/access/{delivery_id}?code={code}"`
pub fn access_link(base_url: &str, delivery_id: &str, code: &str) -> Zeroizing<String> {
    Zeroizing::new(format!(
        "{}/access/{}?code={}",
        base_url.trim_end_matches('/'),
        delivery_id,
        code
    ))
}

/// Outcome of one release run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub delivered: usize,
    /// Already delivered for this trigger, or nothing to deliver
    pub skipped: usize,
    /// Left pending; a later run retries them
    pub failed: usize,
}

/// What a recipient sees after redeeming a code.
#[derive(Debug, Clone)]
pub struct Redemption {
    pub delivery: Delivery,
    pub questions: Vec<String>,
}

pub struct DeliveryService {
    store: Arc<dyn Store>,
    sink: Arc<dyn NotificationSink>,
    codes: AccessCodeService,
    gate: Arc<dyn TimeGate>,
    base_url: String,
}

impl DeliveryService {
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
        codes: AccessCodeService,
        gate: Arc<dyn TimeGate>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sink,
            codes,
            gate,
            base_url: base_url.into(),
        }
    }

    pub fn codes(&self) -> &AccessCodeService {
        &self.codes
    }

    /// Deliver every assignment of every secret `user` owns.
    ///
    /// Failures are isolated per recipient. Re-running for the same trigger
    /// retries pending deliveries and skips delivered ones.
    pub async fn release_for_user(&self, user: &User, now: DateTime<Utc>) -> Result<ReleaseReport> {
        let triggered_at = user.check_in.triggered_at.unwrap_or(now);
        let mut report = ReleaseReport::default();

        for secret in self.store.secrets_for_owner(&user.id).await? {
            for assignment in self.store.assignments_for_secret(&secret.id).await? {
                match self.deliver(user, &assignment, triggered_at, now).await {
                    Ok(true) => report.delivered += 1,
                    Ok(false) => report.skipped += 1,
                    Err(e) => {
                        warn!(
                            user_id = %user.id,
                            assignment_id = %assignment.id,
                            error = %e,
                            "Delivery failed"
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            user_id = %user.id,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Released secrets"
        );
        Ok(report)
    }

    async fn deliver(
        &self,
        user: &User,
        assignment: &SecretAssignment,
        triggered_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if assignment.question_set.is_none() {
            warn!(assignment_id = %assignment.id, "Assignment has no questions; not delivered");
            return Ok(false);
        }

        let recipient = self.store.get_recipient(&assignment.recipient_id).await?;
        let delivery = Delivery::new(
            user.id.clone(),
            recipient.id.clone(),
            assignment.id.clone(),
            triggered_at,
            now,
        );

        match self.store.create_delivery(delivery.clone()).await {
            Ok(()) => {}
            Err(VigilError::Conflict(_)) => {
                if self.store.get_delivery(&delivery.id).await?.is_delivered() {
                    debug!(delivery_id = %delivery.id, "Already delivered for this trigger");
                    return Ok(false);
                }
            }
            Err(e) => return Err(e),
        }

        let attempt = self.store.add_delivery_attempt(&delivery.id).await?;
        if attempt.attempts > 1 {
            info!(delivery_id = %delivery.id, attempt = attempt.attempts, "Retrying delivery");
        }

        let (code, _) = self
            .codes
            .issue_code(&recipient.id, &delivery.id, &assignment.id, now)
            .await?;
        let link = access_link(&self.base_url, &delivery.id, &code);

        self.sink.deliver_secret(&recipient, &link).await?;
        self.store.mark_delivery_sent(&delivery.id, now).await?;
        debug!(delivery_id = %delivery.id, recipient_id = %recipient.id, "Delivered");
        Ok(true)
    }

    async fn question_set(&self, delivery: &Delivery) -> Result<QuestionSet> {
        self.store
            .get_assignment(&delivery.assignment_id)
            .await?
            .question_set
            .ok_or_else(|| VigilError::NotFound(format!("questions for {}", delivery.assignment_id)))
    }

    /// Redeem an access code and return the recovery questions.
    ///
    /// The time gate is checked first, so a code is not consumed while the
    /// questions are still locked.
    pub async fn redeem(&self, delivery_id: &str, code: &str, now: DateTime<Utc>) -> Result<Redemption> {
        let delivery = self.store.get_delivery(delivery_id).await?;
        let set = self.question_set(&delivery).await?;
        let questions = recovery::questions(&set, self.gate.as_ref(), now)?;

        self.codes.verify(delivery_id, code, now).await?;
        Ok(Redemption {
            delivery,
            questions,
        })
    }

    /// Reconstruct the delivered secret from the recipient's answers.
    ///
    /// Requires a code of this delivery to have been redeemed and still be
    /// inside its validity window. Each call spends one of that code's
    /// `max_attempts` recovery attempts; once they are gone it fails with `Locked`.
    pub async fn recover(
        &self,
        delivery_id: &str,
        answers: &[Option<&str>],
        now: DateTime<Utc>,
    ) -> Result<Zeroizing<Vec<u8>>> {
        let redeemed = self
            .store
            .access_codes_for_delivery(delivery_id)
            .await?
            .into_iter()
            .find(|c| c.is_used() && !c.is_expired(now))
            .ok_or_else(|| {
                VigilError::Unauthorized("redeem an access code before answering".into())
            })?;
        let charged = self.codes.charge_answer_attempt(&redeemed.id).await?;
        debug!(
            delivery_id,
            attempt = charged.answer_attempts,
            max = charged.max_attempts,
            "Recovery attempt"
        );

        let delivery = self.store.get_delivery(delivery_id).await?;
        let set = self.question_set(&delivery).await?;
        let secret = recovery::open(&set, answers, self.gate.as_ref(), now)?;

        info!(delivery_id, "Secret recovered");
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_link_format() {
        let link = access_link("https://vigil.example/", "a1:1700000000", "c0ffee");
        assert_eq!(
            link.as_str(),
            "https://vigil.example/access/a1:1700000000?code=c0ffee"
        );
    }
}
