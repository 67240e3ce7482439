use std::sync::Arc;

use chrono::TimeZone;

use super::*;
use crate::profile::DeliveryHour;
use crate::store::InMemoryProfileStore;
use crate::test_utils::{
    CannedGenerator, FailingGenerator, FailingMessenger, FlakyProfileStore, ManualClock,
    RecordingMessenger,
};

const STORY: &str = "Ecco la storia di oggi.";
const FALLBACK: &str = "No story today, sorry.";

// 10:30 in Rome (summer, UTC+2).
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 8, 30, 0).unwrap()
}

fn profile(user_id: UserId) -> UserDeliveryProfile {
    UserDeliveryProfile {
        language: Some("Italian".to_owned()),
        level: Some("B1".to_owned()),
        delivery_hour: Some(DeliveryHour::new(9).unwrap()),
        timezone: Some("Europe/Rome".to_owned()),
        configured: true,
        ..UserDeliveryProfile::new(user_id)
    }
}

struct TestContext {
    store: Arc<InMemoryProfileStore>,
    messenger: RecordingMessenger,
    executor: DeliveryExecutor,
}

impl TestContext {
    fn new(generator: Arc<dyn ContentGenerator>) -> Self {
        let store = Arc::new(InMemoryProfileStore::new());
        let messenger = RecordingMessenger::new();
        let clock = ManualClock::new(now());
        let executor = DeliveryExecutor::new(
            store.clone(),
            generator,
            Arc::new(messenger.clone()),
            Arc::new(clock),
            FALLBACK.to_owned(),
        );

        Self {
            store,
            messenger,
            executor,
        }
    }
}

#[tokio::test]
async fn delivers_the_story_and_records_last_sent() {
    let ctx = TestContext::new(Arc::new(CannedGenerator(STORY)));
    ctx.store.insert(profile(1)).await;

    let outcome = ctx.executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Sent);
    assert_eq!(ctx.messenger.sent(), vec![(1, STORY.to_owned())]);
    let stored = ctx.store.get(1).await.unwrap().unwrap();
    assert_eq!(stored.last_sent, Some(now()));
}

#[tokio::test]
async fn skips_when_already_delivered_on_the_same_local_day() {
    let ctx = TestContext::new(Arc::new(CannedGenerator(STORY)));
    let mut profile = profile(1);
    // 09:05 Rome this morning.
    let this_morning = Utc.with_ymd_and_hms(2025, 6, 15, 7, 5, 0).unwrap();
    profile.last_sent = Some(this_morning);
    ctx.store.insert(profile).await;

    let outcome = ctx.executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Skipped);
    assert!(ctx.messenger.sent().is_empty());
    let stored = ctx.store.get(1).await.unwrap().unwrap();
    assert_eq!(stored.last_sent, Some(this_morning));
}

#[tokio::test]
async fn delivers_when_last_sent_was_a_previous_local_day() {
    let ctx = TestContext::new(Arc::new(CannedGenerator(STORY)));
    let mut profile = profile(1);
    // 23:50 Rome yesterday evening.
    profile.last_sent = Some(Utc.with_ymd_and_hms(2025, 6, 14, 21, 50, 0).unwrap());
    ctx.store.insert(profile).await;

    let outcome = ctx.executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Sent);
    assert_eq!(ctx.messenger.sent().len(), 1);
}

#[tokio::test]
async fn drops_silently_when_the_profile_is_gone() {
    let ctx = TestContext::new(Arc::new(CannedGenerator(STORY)));

    let outcome = ctx.executor.run(404).await;

    assert_eq!(outcome, DeliveryOutcome::Dropped);
    assert!(ctx.messenger.sent().is_empty());
}

#[tokio::test]
async fn drops_when_the_user_paused_after_arming() {
    let ctx = TestContext::new(Arc::new(CannedGenerator(STORY)));
    let mut profile = profile(1);
    profile.paused = true;
    ctx.store.insert(profile).await;

    let outcome = ctx.executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Dropped);
    assert!(ctx.messenger.sent().is_empty());
}

#[tokio::test]
async fn generator_failure_sends_the_fallback_and_still_counts() {
    let ctx = TestContext::new(Arc::new(FailingGenerator));
    ctx.store.insert(profile(1)).await;

    let outcome = ctx.executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Sent);
    assert_eq!(ctx.messenger.sent(), vec![(1, FALLBACK.to_owned())]);
    let stored = ctx.store.get(1).await.unwrap().unwrap();
    assert_eq!(stored.last_sent, Some(now()));
}

#[tokio::test]
async fn missing_language_sends_the_fallback() {
    let ctx = TestContext::new(Arc::new(CannedGenerator(STORY)));
    let mut profile = profile(1);
    profile.language = None;
    ctx.store.insert(profile).await;

    let outcome = ctx.executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Sent);
    assert_eq!(ctx.messenger.sent(), vec![(1, FALLBACK.to_owned())]);
}

#[tokio::test]
async fn send_failure_is_not_retried_and_the_day_still_counts() {
    let store = Arc::new(InMemoryProfileStore::new());
    store.insert(profile(1)).await;
    let executor = DeliveryExecutor::new(
        store.clone(),
        Arc::new(CannedGenerator(STORY)),
        Arc::new(FailingMessenger),
        Arc::new(ManualClock::new(now())),
        FALLBACK.to_owned(),
    );

    let outcome = executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Sent);
    let stored = store.get(1).await.unwrap().unwrap();
    assert_eq!(stored.last_sent, Some(now()));
}

#[tokio::test]
async fn unrecorded_delivery_must_not_rearm() {
    let store = Arc::new(FlakyProfileStore::new());
    store.insert(profile(1)).await;
    let messenger = RecordingMessenger::new();
    let executor = DeliveryExecutor::new(
        store.clone(),
        Arc::new(CannedGenerator(STORY)),
        Arc::new(messenger.clone()),
        Arc::new(ManualClock::new(now())),
        FALLBACK.to_owned(),
    );
    store.fail_updates(true);

    let outcome = executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Failed);
    // The message itself went out; only the bookkeeping failed.
    assert_eq!(messenger.sent().len(), 1);
}

#[tokio::test]
async fn unresolvable_timezone_at_fire_time_fails_the_cycle() {
    let ctx = TestContext::new(Arc::new(CannedGenerator(STORY)));
    let mut profile = profile(1);
    profile.timezone = Some("Mare/Tranquillitatis".to_owned());
    ctx.store.insert(profile).await;

    let outcome = ctx.executor.run(1).await;

    assert_eq!(outcome, DeliveryOutcome::Failed);
    assert!(ctx.messenger.sent().is_empty());
}
