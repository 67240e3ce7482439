use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::clock::Clock;
use crate::delivery::{ContentGenerator, Messenger};
use crate::profile::{UserDeliveryProfile, UserId};
use crate::store::{InMemoryProfileStore, ProfileStore, ProfileUpdate};

#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Clone, Default)]
pub struct RecordingMessenger {
    messages: Arc<Mutex<Vec<(UserId, String)>>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, user_id: UserId, text: &str) -> anyhow::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((user_id, text.to_owned()));
        Ok(())
    }
}

pub struct FailingMessenger;

#[async_trait]
impl Messenger for FailingMessenger {
    async fn send_message(&self, _user_id: UserId, _text: &str) -> anyhow::Result<()> {
        anyhow::bail!("chat unreachable")
    }
}

pub struct CannedGenerator(pub &'static str);

#[async_trait]
impl ContentGenerator for CannedGenerator {
    async fn generate(&self, _language: &str, _level: &str) -> anyhow::Result<String> {
        Ok(self.0.to_owned())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl ContentGenerator for FailingGenerator {
    async fn generate(&self, _language: &str, _level: &str) -> anyhow::Result<String> {
        anyhow::bail!("generator unavailable")
    }
}

/// In-memory store whose writes can be made to fail on demand.
pub struct FlakyProfileStore {
    inner: InMemoryProfileStore,
    fail_updates: AtomicBool,
}

impl FlakyProfileStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryProfileStore::new(),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub async fn insert(&self, profile: UserDeliveryProfile) {
        self.inner.insert(profile).await;
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProfileStore for FlakyProfileStore {
    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<UserDeliveryProfile>> {
        self.inner.get(user_id).await
    }

    async fn update(&self, user_id: UserId, update: ProfileUpdate) -> anyhow::Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        self.inner.update(user_id, update).await
    }

    async fn list_active(&self) -> anyhow::Result<Vec<UserDeliveryProfile>> {
        self.inner.list_active().await
    }
}
