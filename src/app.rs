//! Wired application components

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::auth::{hash_password, MemoryChallengeStore, PasswordIdentity};
use crate::config::Args;
use crate::crypto::EnvelopeCodec;
use crate::db::schemas::User;
use crate::db::{MemoryStore, Store};
use crate::delivery::{AccessCodeService, DeliveryService};
use crate::notify::{ChannelRouter, NotificationSink, WebhookChannel};
use crate::scheduler::{CheckInState, SwitchScheduler};
use crate::services::SecretService;
use crate::types::Result;
use crate::vault::{RoundGate, TimeGate};

/// Every long-lived component, sharing one store and one sink.
#[derive(Clone)]
pub struct App {
    pub args: Args,
    pub store: Arc<dyn Store>,
    pub sink: Arc<dyn NotificationSink>,
    pub gate: Arc<dyn TimeGate>,
    pub secrets: Arc<SecretService>,
    pub delivery: Arc<DeliveryService>,
    pub scheduler: Arc<SwitchScheduler>,
    pub challenges: Arc<MemoryChallengeStore>,
    pub passwords: Arc<PasswordIdentity>,
}

impl App {
    /// Build against an in-memory store.
    pub fn from_args(args: Args) -> Result<Self> {
        Self::with_store(args, Arc::new(MemoryStore::new()))
    }

    /// Build against `store`, routing notifications through the configured channels.
    pub fn with_store(args: Args, store: Arc<dyn Store>) -> Result<Self> {
        let mut router = ChannelRouter::with_log();
        if let Some(url) = &args.webhook_url {
            router.register(Arc::new(WebhookChannel::new(url.clone(), args.webhook_timeout())?));
            info!("Webhook channel enabled");
        }
        Self::with_parts(args, store, Arc::new(router))
    }

    pub fn with_parts(
        args: Args,
        store: Arc<dyn Store>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let gate: Arc<dyn TimeGate> = Arc::new(RoundGate::new(args.round_clock()?));

        let codes = AccessCodeService::new(store.clone(), args.access_code_config());
        let delivery = Arc::new(DeliveryService::new(
            store.clone(),
            sink.clone(),
            codes,
            gate.clone(),
            args.public_base_url.clone(),
        ));
        let secrets = Arc::new(SecretService::new(
            store.clone(),
            gate.clone(),
            EnvelopeCodec::new(args.kdf_params()),
        ));
        let scheduler = Arc::new(SwitchScheduler::new(
            store.clone(),
            sink.clone(),
            delivery.clone(),
            secrets.clone(),
            args.scheduler_config(),
        ));

        Ok(Self {
            challenges: Arc::new(MemoryChallengeStore::new(args.challenge_config())),
            passwords: Arc::new(PasswordIdentity::new(store.clone())?),
            args,
            store,
            sink,
            gate,
            secrets,
            delivery,
            scheduler,
        })
    }

    /// Register a user with the configured default check-in cadence.
    pub async fn register_user(
        &self,
        identifier: &str,
        password: &str,
        notify_channel: &str,
        notify_address: &str,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let check_in = CheckInState::new(
            now,
            self.args.default_ping_frequency(),
            self.args.default_ping_deadline(),
        );
        let user = User::new(
            identifier.to_string(),
            hash_password(password)?,
            check_in,
            notify_address.to_string(),
        )
        .with_channel(notify_channel);

        self.store.create_user(user.clone()).await?;
        info!(user_id = %user.id, "User registered");
        Ok(user)
    }
}
