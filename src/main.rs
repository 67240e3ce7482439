#![allow(dead_code)]
mod appsettings;
mod clock;
mod delivery;
mod generator;
mod profile;
mod scheduling;
mod store;
mod telegram;
#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use crate::clock::SystemClock;
use crate::generator::PlaceholderStoryGenerator;
use crate::scheduling::{DeliveryExecutor, DeliveryScheduler};
use crate::store::{InMemoryProfileStore, ProfileStore};
use crate::telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();

    let settings = appsettings::get()?;

    let store = Arc::new(InMemoryProfileStore::new());
    let messenger = Arc::new(TelegramMessenger::create(settings.telegram.token.clone()));
    let generator = Arc::new(PlaceholderStoryGenerator::new(SystemClock));
    let clock = Arc::new(SystemClock);

    let executor = Arc::new(DeliveryExecutor::new(
        store.clone(),
        generator,
        messenger,
        clock.clone(),
        settings.delivery.fallback_message.clone(),
    ));
    let scheduler = DeliveryScheduler::new(store.clone(), executor, clock);

    // Timers are never persisted; the active-profile set is the source of
    // truth and every timer is rebuilt from it on startup.
    let profiles = store.list_active().await?;
    scheduler.restart_all(profiles).await;

    tokio::signal::ctrl_c().await?;
    log::info!("Shutting down");

    Ok(())
}
