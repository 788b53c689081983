//! Owner-facing secret management
//!
//! Secrets are stored only as envelopes sealed under the owner's master
//! password. Assigning a secret to a recipient splits its plaintext across
//! the recipient's questions and locks them until the owner's deadline.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::crypto::EnvelopeCodec;
use crate::db::schemas::{Recipient, Secret, SecretAssignment};
use crate::db::Store;
use crate::recovery::{self, Prompt};
use crate::types::{Result, VigilError};
use crate::vault::{QuestionSet, TimeGate};

pub struct SecretService {
    store: Arc<dyn Store>,
    gate: Arc<dyn TimeGate>,
    codec: EnvelopeCodec,
}

impl SecretService {
    pub fn new(store: Arc<dyn Store>, gate: Arc<dyn TimeGate>, codec: EnvelopeCodec) -> Self {
        Self { store, gate, codec }
    }

    pub async fn create_secret(
        &self,
        owner_id: &str,
        name: &str,
        plaintext: &[u8],
        master_password: &str,
        now: DateTime<Utc>,
    ) -> Result<Secret> {
        if name.trim().is_empty() {
            return Err(VigilError::Validation("secret name must not be empty".into()));
        }
        if plaintext.is_empty() {
            return Err(VigilError::Validation("secret must not be empty".into()));
        }
        self.store.get_user(owner_id).await?;

        let envelope = self.codec.pack(plaintext, master_password.as_bytes())?;
        let secret = Secret::new(owner_id.to_string(), name.to_string(), envelope, now);
        self.store.create_secret(secret.clone()).await?;

        info!(secret_id = %secret.id, owner_id, "Secret created");
        Ok(secret)
    }

    pub async fn read_secret(&self, id: &str, master_password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let secret = self.store.get_secret(id).await?;
        self.codec.unpack(&secret.envelope, master_password.as_bytes())
    }

    /// Replace the secret's contents.
    ///
    /// Existing question sets hold shares of the old value and are cleared;
    /// each assignment must be re-sealed with [`Self::seal_questions`].
    pub async fn update_secret(
        &self,
        id: &str,
        plaintext: &[u8],
        master_password: &str,
        now: DateTime<Utc>,
    ) -> Result<Secret> {
        if plaintext.is_empty() {
            return Err(VigilError::Validation("secret must not be empty".into()));
        }
        let mut secret = self.store.get_secret(id).await?;
        self.codec.unpack(&secret.envelope, master_password.as_bytes())?;

        secret.envelope = self.codec.pack(plaintext, master_password.as_bytes())?;
        secret.updated_at = now;
        self.store.update_secret(secret.clone()).await?;

        for mut assignment in self.store.assignments_for_secret(id).await? {
            if assignment.question_set.take().is_some() {
                warn!(assignment_id = %assignment.id, "Questions cleared after secret update");
                self.store.update_assignment(assignment).await?;
            }
        }

        info!(secret_id = id, "Secret updated");
        Ok(secret)
    }

    /// Delete the secret and every assignment of it.
    pub async fn delete_secret(&self, id: &str) -> Result<()> {
        for assignment in self.store.assignments_for_secret(id).await? {
            self.store.delete_assignment(&assignment.id).await?;
        }
        self.store.delete_secret(id).await?;
        info!(secret_id = id, "Secret deleted");
        Ok(())
    }

    /// Re-wrap every secret of the owner under a new master password.
    ///
    /// All envelopes are re-wrapped before any is written, so a wrong old
    /// password changes nothing.
    pub async fn change_master_password(
        &self,
        owner_id: &str,
        old_password: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let secrets = self.store.secrets_for_owner(owner_id).await?;
        let rewrapped = secrets
            .into_iter()
            .map(|mut secret| {
                secret.envelope = self.codec.rewrap(
                    &secret.envelope,
                    old_password.as_bytes(),
                    new_password.as_bytes(),
                )?;
                secret.updated_at = now;
                Ok(secret)
            })
            .collect::<Result<Vec<_>>>()?;

        let count = rewrapped.len();
        for secret in rewrapped {
            self.store.update_secret(secret).await?;
        }

        info!(owner_id, secrets = count, "Master password changed");
        Ok(count)
    }

    pub async fn add_recipient(
        &self,
        owner_id: &str,
        name: &str,
        channel: &str,
        address: &str,
    ) -> Result<Recipient> {
        self.store.get_user(owner_id).await?;
        let recipient = Recipient::new(
            owner_id.to_string(),
            name.to_string(),
            channel.to_string(),
            address.to_string(),
        );
        self.store.create_recipient(recipient.clone()).await?;
        Ok(recipient)
    }

    /// Assign a secret to one of the owner's recipients, protected by
    /// `threshold` of the recipient's `prompts`.
    pub async fn assign(
        &self,
        secret_id: &str,
        recipient_id: &str,
        master_password: &str,
        prompts: &[Prompt],
        threshold: usize,
    ) -> Result<SecretAssignment> {
        let secret = self.store.get_secret(secret_id).await?;
        let recipient = self.store.get_recipient(recipient_id).await?;
        if recipient.owner_id != secret.owner_id {
            return Err(VigilError::Validation(
                "recipient belongs to a different owner".into(),
            ));
        }

        let mut assignment =
            SecretAssignment::new(secret.id.clone(), recipient.id.clone(), None);
        assignment.question_set = Some(
            self.seal_for(&secret, master_password, prompts, threshold)
                .await?,
        );
        self.store.create_assignment(assignment.clone()).await?;

        info!(
            assignment_id = %assignment.id,
            secret_id,
            recipient_id,
            threshold,
            questions = prompts.len(),
            "Secret assigned"
        );
        Ok(assignment)
    }

    /// Replace an assignment's questions, re-splitting the current secret.
    pub async fn seal_questions(
        &self,
        assignment_id: &str,
        master_password: &str,
        prompts: &[Prompt],
        threshold: usize,
    ) -> Result<SecretAssignment> {
        let mut assignment = self.store.get_assignment(assignment_id).await?;
        let secret = self.store.get_secret(&assignment.secret_id).await?;

        assignment.question_set = Some(
            self.seal_for(&secret, master_password, prompts, threshold)
                .await?,
        );
        self.store.update_assignment(assignment.clone()).await?;
        Ok(assignment)
    }

    /// Move an assignment's release point.
    pub async fn extend_release(
        &self,
        assignment_id: &str,
        release_at: DateTime<Utc>,
    ) -> Result<SecretAssignment> {
        let mut assignment = self.store.get_assignment(assignment_id).await?;
        let set = assignment
            .question_set
            .as_ref()
            .ok_or_else(|| VigilError::NotFound(format!("questions for {}", assignment_id)))?;

        let moved = self.gate.relock(set, release_at)?;
        info!(
            assignment_id,
            from_round = set.target_round,
            to_round = moved.target_round,
            "Release moved"
        );
        assignment.question_set = Some(moved);
        self.store.update_assignment(assignment.clone()).await?;
        Ok(assignment)
    }

    /// Push every question set of the owner's secrets out to the owner's
    /// current deadline. Sets already locked at or past it are left alone.
    ///
    /// Runs after each check-in and re-arm, so a set never opens while the
    /// owner is still checking in.
    pub async fn sync_release_times(&self, owner_id: &str) -> Result<usize> {
        let owner = self.store.get_user(owner_id).await?;
        let release_at = owner.check_in.deadline();
        let target = self.gate.release_round(release_at);

        let mut moved = 0;
        for secret in self.store.secrets_for_owner(owner_id).await? {
            for mut assignment in self.store.assignments_for_secret(&secret.id).await? {
                let Some(set) = assignment.question_set.as_ref() else {
                    continue;
                };
                if set.target_round >= target {
                    continue;
                }
                let relocked = self.gate.relock(set, release_at)?;
                assignment.question_set = Some(relocked);
                self.store.update_assignment(assignment).await?;
                moved += 1;
            }
        }

        if moved > 0 {
            debug!(owner_id, moved, round = target, "Question sets follow deadline");
        }
        Ok(moved)
    }

    async fn seal_for(
        &self,
        secret: &Secret,
        master_password: &str,
        prompts: &[Prompt],
        threshold: usize,
    ) -> Result<QuestionSet> {
        let owner = self.store.get_user(&secret.owner_id).await?;
        let plaintext = self
            .codec
            .unpack(&secret.envelope, master_password.as_bytes())?;

        recovery::seal(
            &plaintext,
            prompts,
            threshold,
            owner.check_in.deadline(),
            self.gate.as_ref(),
        )
    }
}
