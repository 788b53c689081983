//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use clap::Parser;
use tokio::sync::Mutex;

use vigil::db::schemas::{Recipient, User};
use vigil::db::MemoryStore;
use vigil::notify::NotificationSink;
use vigil::scheduler::Urgency;
use vigil::{App, Args, Result, VigilError};

/// Something the sink was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Prompt { address: String, urgency: Urgency },
    Delivery { address: String, link: String },
}

/// Records every message and fails for chosen addresses.
#[derive(Default)]
pub struct RecordingSink {
    pub sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub async fn fail_for(&self, address: &str) {
        self.failing.lock().await.insert(address.to_string());
    }

    pub async fn recover_for(&self, address: &str) {
        self.failing.lock().await.remove(address);
    }

    pub async fn prompts(&self) -> Vec<(String, Urgency)> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Prompt { address, urgency } => Some((address.clone(), *urgency)),
                _ => None,
            })
            .collect()
    }

    pub async fn links(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Delivery { address, link } => Some((address.clone(), link.clone())),
                _ => None,
            })
            .collect()
    }

    async fn check(&self, address: &str) -> Result<()> {
        if self.failing.lock().await.contains(address) {
            return Err(VigilError::Notification(format!("{address} unreachable")));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send_check_in_prompt(&self, user: &User, urgency: Urgency) -> Result<()> {
        self.check(&user.notify_address).await?;
        self.sent.lock().await.push(Sent::Prompt {
            address: user.notify_address.clone(),
            urgency,
        });
        Ok(())
    }

    async fn deliver_secret(&self, recipient: &Recipient, link: &str) -> Result<()> {
        self.check(&recipient.address).await?;
        self.sent.lock().await.push(Sent::Delivery {
            address: recipient.address.clone(),
            link: link.to_string(),
        });
        Ok(())
    }
}

/// 2026-03-01T12:00:00Z
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// One-second rounds, one-day pings, three-day deadline.
pub fn test_args() -> Args {
    Args::try_parse_from([
        "vigil",
        "--round-period-secs",
        "1",
        "--default-ping-frequency-hours",
        "24",
        "--default-ping-deadline-hours",
        "72",
        "--public-base-url",
        "https://vigil.example",
    ])
    .unwrap()
}

pub fn test_app() -> (App, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let app = App::with_parts(test_args(), Arc::new(MemoryStore::new()), sink.clone()).unwrap();
    (app, sink)
}

/// `(delivery_id, code)` from an access link.
pub fn parse_link(link: &str) -> (String, String) {
    let rest = link
        .strip_prefix("https://vigil.example/access/")
        .expect("link has base url");
    let (delivery_id, code) = rest.split_once("?code=").expect("link has code");
    (delivery_id.to_string(), code.to_string())
}
