use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::time::timeout;

use crate::clock::Clock;
use crate::delivery::{ContentGenerator, GENERATION_TIMEOUT, Messenger, SEND_TIMEOUT};
use crate::profile::{UserDeliveryProfile, UserId};
use crate::store::{ProfileStore, ProfileUpdate};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A story (or the fallback) went out and `last_sent` was recorded.
    Sent,
    /// Already delivered on this local calendar day; nothing was sent.
    Skipped,
    /// Profile gone or inactive; the cycle ends without re-arming.
    Dropped,
    /// `last_sent` could not be persisted; the cycle must not re-arm.
    Failed,
}

/// The unit of work behind a fired timer. Receives only the user id; the
/// profile is re-read fresh because it may have changed since arming.
pub struct DeliveryExecutor {
    store: Arc<dyn ProfileStore>,
    generator: Arc<dyn ContentGenerator>,
    messenger: Arc<dyn Messenger>,
    clock: Arc<dyn Clock>,
    fallback_message: String,
}

impl DeliveryExecutor {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        generator: Arc<dyn ContentGenerator>,
        messenger: Arc<dyn Messenger>,
        clock: Arc<dyn Clock>,
        fallback_message: String,
    ) -> Self {
        Self {
            store,
            generator,
            messenger,
            clock,
            fallback_message,
        }
    }

    pub async fn run(&self, user_id: UserId) -> DeliveryOutcome {
        let profile = match self.store.get(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                log::info!("[FIRE] User {user_id} no longer exists, dropping delivery");
                return DeliveryOutcome::Dropped;
            }
            Err(err) => {
                log::error!("[FIRE] Could not load profile for user {user_id}: {err:#}");
                return DeliveryOutcome::Failed;
            }
        };

        if !profile.active() {
            log::info!("[FIRE] User {user_id} is inactive, dropping delivery");
            return DeliveryOutcome::Dropped;
        }

        let Some(tz) = profile.timezone.as_deref() else {
            log::info!("[FIRE] User {user_id} lost its timezone, dropping delivery");
            return DeliveryOutcome::Dropped;
        };
        let tz: Tz = match tz.parse() {
            Ok(tz) => tz,
            Err(_) => {
                log::error!("[FIRE] User {user_id} has unresolvable timezone {tz:?}");
                return DeliveryOutcome::Failed;
            }
        };

        let now = self.clock.now_utc();
        if already_sent_today(&profile, tz, now) {
            log::info!("[SKIP] User {user_id} already received today's story");
            return DeliveryOutcome::Skipped;
        }

        let text = self.generate_story(&profile).await;

        match timeout(SEND_TIMEOUT, self.messenger.send_message(user_id, &text)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::warn!("[FIRE] Sending to user {user_id} failed: {err:#}");
            }
            Err(_) => {
                log::warn!("[FIRE] Sending to user {user_id} timed out");
            }
        }

        if let Err(err) = self.store.update(user_id, ProfileUpdate::last_sent(now)).await {
            log::error!(
                "[FIRE] Could not record delivery for user {user_id}, not re-arming: {err:#}"
            );
            return DeliveryOutcome::Failed;
        }

        log::info!("[FIRE] Delivered story to user {user_id}");
        DeliveryOutcome::Sent
    }

    async fn generate_story(&self, profile: &UserDeliveryProfile) -> String {
        let user_id = profile.user_id;
        let (Some(language), Some(level)) = (profile.language.as_deref(), profile.level.as_deref())
        else {
            log::warn!("[FIRE] User {user_id} has no language/level, sending fallback");
            return self.fallback_message.clone();
        };

        match timeout(GENERATION_TIMEOUT, self.generator.generate(language, level)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                log::warn!("[FIRE] Generation failed for user {user_id}, sending fallback: {err:#}");
                self.fallback_message.clone()
            }
            Err(_) => {
                log::warn!("[FIRE] Generation timed out for user {user_id}, sending fallback");
                self.fallback_message.clone()
            }
        }
    }
}

fn already_sent_today(profile: &UserDeliveryProfile, tz: Tz, now: DateTime<Utc>) -> bool {
    let today = now.with_timezone(&tz).date_naive();
    profile
        .last_sent
        .is_some_and(|sent| sent.with_timezone(&tz).date_naive() == today)
}

#[cfg(test)]
mod tests;
