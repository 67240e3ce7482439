use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::profile::{DeliveryHour, UserDeliveryProfile, UserId};

/// Sparse update: only the set fields are written.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub language: Option<String>,
    pub level: Option<String>,
    pub delivery_hour: Option<DeliveryHour>,
    pub timezone: Option<String>,
    pub last_sent: Option<DateTime<Utc>>,
    pub configured: Option<bool>,
    pub paused: Option<bool>,
}

impl ProfileUpdate {
    pub fn last_sent(timestamp: DateTime<Utc>) -> Self {
        Self {
            last_sent: Some(timestamp),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<UserDeliveryProfile>>;

    async fn update(&self, user_id: UserId, update: ProfileUpdate) -> anyhow::Result<()>;

    async fn list_active(&self) -> anyhow::Result<Vec<UserDeliveryProfile>>;
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<UserId, UserDeliveryProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: UserDeliveryProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id, profile);
    }

    pub async fn remove(&self, user_id: UserId) {
        self.profiles.write().await.remove(&user_id);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get(&self, user_id: UserId) -> anyhow::Result<Option<UserDeliveryProfile>> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn update(&self, user_id: UserId, update: ProfileUpdate) -> anyhow::Result<()> {
        let mut profiles = self.profiles.write().await;
        let Some(profile) = profiles.get_mut(&user_id) else {
            anyhow::bail!("no profile for user {user_id}");
        };

        if let Some(language) = update.language {
            profile.language = Some(language);
        }
        if let Some(level) = update.level {
            profile.level = Some(level);
        }
        if let Some(hour) = update.delivery_hour {
            profile.delivery_hour = Some(hour);
        }
        if let Some(timezone) = update.timezone {
            profile.timezone = Some(timezone);
        }
        if let Some(last_sent) = update.last_sent {
            profile.last_sent = Some(last_sent);
        }
        if let Some(configured) = update.configured {
            profile.configured = configured;
        }
        if let Some(paused) = update.paused {
            profile.paused = paused;
        }

        Ok(())
    }

    async fn list_active(&self) -> anyhow::Result<Vec<UserDeliveryProfile>> {
        Ok(self
            .profiles
            .read()
            .await
            .values()
            .filter(|profile| profile.active())
            .cloned()
            .collect())
    }
}
