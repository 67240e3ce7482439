use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{RwLock, mpsc, watch},
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::profile::{UserDeliveryProfile, UserId};
use crate::store::ProfileStore;

use super::executor::{DeliveryExecutor, DeliveryOutcome};
use super::next_fire::{ScheduleError, compute_next_fire};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug)]
enum CycleEvent {
    Arm,
    Trigger { epoch: u64 },
    Stop,
}

struct UserTaskHandle {
    task: JoinHandle<()>,
    tx: mpsc::Sender<CycleEvent>,
}

struct CleanupTask(watch::Sender<()>);

type TimerRegistry = RwLock<HashMap<UserId, UserTaskHandle>>;

/// Owns the decision of when each user's next delivery fires.
///
/// One event-driven task per armed user; every executor run for a user
/// happens inside that task, so per-user delivery cycles never overlap while
/// different users fire fully in parallel. Timers are never persisted;
/// `restart_all` rebuilds them from the profile store.
pub struct DeliveryScheduler {
    timers: Arc<TimerRegistry>,
    store: Arc<dyn ProfileStore>,
    executor: Arc<DeliveryExecutor>,
    clock: Arc<dyn Clock>,
    cleanup_task: CleanupTask,
}

impl DeliveryScheduler {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        executor: Arc<DeliveryExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let timers = Arc::new(RwLock::new(HashMap::new()));
        let cleanup_task = Self::spawn_cleanup_task(Arc::clone(&timers));

        Self {
            timers,
            store,
            executor,
            clock,
            cleanup_task,
        }
    }

    /// Schedules the user's next delivery, replacing any pending timer.
    ///
    /// Configuration problems (missing schedule, unknown timezone) surface
    /// here, synchronously, before anything is armed. Returns the instant the
    /// timer will fire for caller display.
    pub async fn arm(
        &self,
        user_id: UserId,
        profile: &UserDeliveryProfile,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let (hour, timezone) = profile.schedule_params()?;
        let fire_at = compute_next_fire(hour, timezone, profile.last_sent, self.clock.now_utc())?;

        let mut timers = self.timers.write().await;
        if let Some(handle) = timers.get(&user_id) {
            // A live task re-arms in place; its pending trigger goes stale.
            if !handle.task.is_finished() && handle.tx.send(CycleEvent::Arm).await.is_ok() {
                log::info!("[ARM] Re-armed existing timer for user {user_id}");
                return Ok(fire_at);
            }
        }

        let handle = self.spawn_cycle_task(user_id);
        timers.insert(user_id, handle);

        Ok(fire_at)
    }

    /// Removes the user's pending timer. No-op when none exists. Safe while
    /// a delivery for the user is in flight: the cycle task finishes its
    /// current firing (including the persistence step) before it observes
    /// the stop.
    pub async fn cancel(&self, user_id: UserId) {
        if let Some((_, handle)) = self.timers.write().await.remove_entry(&user_id) {
            let _ = handle.tx.send(CycleEvent::Stop).await;
            log::info!("[CANCEL] Cancelled delivery timer for user {user_id}");
        }
    }

    /// Rebuilds all timers from persisted profiles. Called once at process
    /// start, before any new schedule requests are accepted. Profiles that
    /// are inactive or missing hour/timezone are skipped, not errors.
    pub async fn restart_all(&self, profiles: Vec<UserDeliveryProfile>) -> usize {
        let mut armed = 0;
        for profile in profiles {
            if !profile.active() || !profile.is_schedulable() {
                continue;
            }

            match self.arm(profile.user_id, &profile).await {
                Ok(fire_at) => {
                    log::info!(
                        "[RESTART] User {} rescheduled for {fire_at}",
                        profile.user_id
                    );
                    armed += 1;
                }
                Err(err) => {
                    log::warn!("[RESTART] Skipping user {}: {err}", profile.user_id);
                }
            }
        }

        log::info!("[RESTART] Armed {armed} delivery timers");
        armed
    }

    /// Number of live per-user timers.
    pub async fn scheduled_count(&self) -> usize {
        self.timers
            .read()
            .await
            .values()
            .filter(|handle| !handle.task.is_finished())
            .count()
    }

    fn spawn_cycle_task(&self, user_id: UserId) -> UserTaskHandle {
        log::info!("Starting delivery cycle task for user {user_id}");
        let (tx, rx) = mpsc::channel(10);

        let tx_clone = tx.clone();
        let deps = CycleDeps {
            store: Arc::clone(&self.store),
            executor: Arc::clone(&self.executor),
            clock: Arc::clone(&self.clock),
        };
        let task = task::spawn(async move {
            if tx_clone.send(CycleEvent::Arm).await.is_ok() {
                run_cycle(user_id, deps, rx, tx_clone).await;
            }
        });

        UserTaskHandle { task, tx }
    }

    fn spawn_cleanup_task(timers: Arc<TimerRegistry>) -> CleanupTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        task::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(CLEANUP_INTERVAL) => {
                        Self::clean_finished_tasks(&timers).await;
                    }
                    _ = shutdown_rx.changed() => {
                        log::info!("Cleanup task shutting down");
                        break;
                    }
                };
            }
        });

        CleanupTask(shutdown_tx)
    }

    async fn clean_finished_tasks(timers: &TimerRegistry) {
        let mut timers = timers.write().await;
        let before = timers.len();
        timers.retain(|_, handle| !handle.task.is_finished());
        let after = timers.len();

        if before != after {
            log::info!("Cleaned up {} retired delivery timers", before - after);
        }
    }
}

impl Drop for DeliveryScheduler {
    fn drop(&mut self) {
        let _ = self.cleanup_task.0.send(());
    }
}

struct CycleDeps {
    store: Arc<dyn ProfileStore>,
    executor: Arc<DeliveryExecutor>,
    clock: Arc<dyn Clock>,
}

/// Per-user delivery cycle: Armed → Firing → (Sent | Skipped | Failed) and
/// back to Armed, driven by events. The epoch stamps each armed timer so a
/// trigger from a replaced timer is recognized as stale and ignored.
async fn run_cycle(
    user_id: UserId,
    deps: CycleDeps,
    mut rx: mpsc::Receiver<CycleEvent>,
    tx: mpsc::Sender<CycleEvent>,
) {
    let mut epoch: u64 = 0;
    let mut sleeper = CancellationToken::new();

    while let Some(event) = rx.recv().await {
        let keep_running = match event {
            CycleEvent::Stop => {
                log::info!("[STOP] Delivery cycle for user {user_id} stopped");
                false
            }
            CycleEvent::Arm => {
                epoch += 1;
                arm_cycle(user_id, &deps, &tx, epoch, &mut sleeper).await
            }
            CycleEvent::Trigger { epoch: fired } if fired == epoch => {
                match deps.executor.run(user_id).await {
                    DeliveryOutcome::Sent | DeliveryOutcome::Skipped => {
                        epoch += 1;
                        arm_cycle(user_id, &deps, &tx, epoch, &mut sleeper).await
                    }
                    DeliveryOutcome::Dropped | DeliveryOutcome::Failed => false,
                }
            }
            CycleEvent::Trigger { epoch: stale } => {
                log::debug!(
                    "Ignoring stale trigger for user {user_id} [fired = {stale}, current = {epoch}]"
                );
                true
            }
        };

        if !keep_running {
            break;
        }
    }

    sleeper.cancel();
}

/// Reads the profile fresh, computes the next fire instant and starts the
/// sleeper for it. Returns false when the cycle should retire instead
/// (user gone, paused, unschedulable, or unrecoverable schedule error).
async fn arm_cycle(
    user_id: UserId,
    deps: &CycleDeps,
    tx: &mpsc::Sender<CycleEvent>,
    epoch: u64,
    sleeper: &mut CancellationToken,
) -> bool {
    let profile = match deps.store.get(user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            log::info!("[ARM] User {user_id} no longer exists, retiring timer");
            return false;
        }
        Err(err) => {
            log::error!("[ARM] Could not load profile for user {user_id}: {err:#}");
            return false;
        }
    };

    if !profile.active() {
        log::info!("[ARM] User {user_id} is inactive, retiring timer");
        return false;
    }

    let (hour, timezone) = match profile.schedule_params() {
        Ok(params) => params,
        Err(err) => {
            log::info!("[ARM] {err}, retiring timer");
            return false;
        }
    };

    let now = deps.clock.now_utc();
    let fire_at = match compute_next_fire(hour, timezone, profile.last_sent, now) {
        Ok(fire_at) => fire_at,
        Err(err) => {
            log::error!("[ARM] Cannot schedule user {user_id}: {err}");
            return false;
        }
    };

    let delay = (fire_at - now).to_std().unwrap_or_default();

    sleeper.cancel();
    *sleeper = CancellationToken::new();
    send_trigger_after_delay(tx.clone(), epoch, delay, sleeper.child_token());

    log::info!("[ARM] Next delivery for user {user_id} at {fire_at} (sleeping {delay:?})");

    true
}

fn send_trigger_after_delay(
    tx: mpsc::Sender<CycleEvent>,
    epoch: u64,
    delay: Duration,
    cancelled: CancellationToken,
) {
    task::spawn(async move {
        tokio::select! {
            _ = cancelled.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                let _ = tx.send(CycleEvent::Trigger { epoch }).await;
            }
        }
    });
}
