use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{
    sync::{RwLock, watch},
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;

use crate::{
    models::reminder::{Reminder, ReminderId},
    storage::ReminderStore,
};

use super::{ReminderDeliveryChannel, ReminderScheduler, ScheduleOutcome, ScheduledReminder};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

struct ScheduledReminderHandle {
    task: JoinHandle<()>,
    cancellation_token: CancellationToken,
}

struct CleanupTask(watch::Sender<()>);

type ReminderTaskStore = RwLock<HashMap<ReminderId, ScheduledReminderHandle>>;

/// One tokio task per armed reminder.
///
/// A timer only carries the reminder id. When it fires it looks the reminder
/// up in the store, so a reminder deleted while its timer was pending is never
/// delivered, whether or not the timer was cancelled.
pub struct DeliveryReminderScheduler {
    tasks: Arc<ReminderTaskStore>,
    store: Arc<ReminderStore>,
    delivery_channel: Arc<dyn ReminderDeliveryChannel>,
    cleanup_task: CleanupTask,
}

impl DeliveryReminderScheduler {
    pub fn new(store: Arc<ReminderStore>, delivery_channel: Arc<dyn ReminderDeliveryChannel>) -> Self {
        let tasks = Arc::new(RwLock::new(HashMap::new()));
        let cleanup_task = Self::spawn_cleanup_task(Arc::clone(&tasks));

        Self {
            tasks,
            store,
            delivery_channel,
            cleanup_task,
        }
    }

    /// Re-arms timers for everything in the store, e.g. after a restart.
    ///
    /// Past-due reminders are removed from the store before any timer is armed.
    /// Returns the number of armed timers.
    pub async fn restore_from_store(&self) -> usize {
        let expired = self.store.remove_expired(Utc::now()).await;
        if !expired.is_empty() {
            log::info!(
                "Dropped {} reminders that became due while the bot was offline",
                expired.len()
            );
        }

        let mut armed = 0;
        for reminder in self.store.all().await {
            let reminder_id = reminder.id.clone();
            match self.schedule_reminder(reminder).await {
                Ok(ScheduleOutcome::Scheduled(_)) => armed += 1,
                Ok(ScheduleOutcome::Expired) => {}
                Err(error) => log::warn!(
                    "Could not restore reminder timer. [reminder_id = {}, error = {}]",
                    reminder_id,
                    error
                ),
            }
        }

        log::info!("Restored {} reminder timers", armed);
        armed
    }

    #[cfg(test)]
    pub async fn is_scheduled(&self, id: &ReminderId) -> bool {
        self.tasks
            .read()
            .await
            .get(id)
            .is_some_and(|handle| !handle.task.is_finished())
    }

    #[cfg(test)]
    pub async fn tracked_tasks(&self) -> usize {
        self.tasks.read().await.len()
    }

    fn create_reminder_task(&self, reminder_id: ReminderId, delay: Duration) -> ScheduledReminderHandle {
        let cancellation_token = CancellationToken::new();
        let task_cancellation_token = cancellation_token.child_token();
        let store = Arc::clone(&self.store);
        let delivery_channel = Arc::clone(&self.delivery_channel);

        let task = task::spawn(async move {
            tokio::select! {
                _ = task_cancellation_token.cancelled() => {
                    log::info!("[CANCEL] Timer cancelled. ReminderId {}", reminder_id);
                }
                _ = tokio::time::sleep(delay) => {
                    fire_reminder(&reminder_id, store.as_ref(), delivery_channel.as_ref()).await;
                }
            }
        });

        ScheduledReminderHandle {
            task,
            cancellation_token,
        }
    }

    fn spawn_cleanup_task(tasks: Arc<ReminderTaskStore>) -> CleanupTask {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        task::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(CLEANUP_INTERVAL) => {
                        Self::clean_finished_tasks(&tasks).await;
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

    async fn clean_finished_tasks(tasks: &ReminderTaskStore) {
        let mut tasks = tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, handle| !handle.task.is_finished());
        let after = tasks.len();

        if before != after {
            log::info!("Cleaned up {} completed reminder tasks", before - after);
        }
    }
}

impl Drop for DeliveryReminderScheduler {
    fn drop(&mut self) {
        let _ = self.cleanup_task.0.send(());
    }
}

#[async_trait]
impl ReminderScheduler for DeliveryReminderScheduler {
    async fn schedule_reminder(&self, reminder: Reminder) -> anyhow::Result<ScheduleOutcome> {
        let reminder_id = reminder.id;

        let Some(delay) = get_target_delay(&reminder.due_at, Utc::now()) else {
            log::info!(
                "[EXPIRED] Reminder is already due, dropping it undelivered. ReminderId {}",
                reminder_id
            );
            self.store.remove(&reminder_id).await;
            return Ok(ScheduleOutcome::Expired);
        };

        let mut tasks = self.tasks.write().await;
        if tasks
            .get(&reminder_id)
            .is_some_and(|handle| !handle.task.is_finished())
        {
            anyhow::bail!("Already scheduled")
        }

        log::info!(
            "[SCHEDULE] Sleeping for {:?} delay. ReminderId {}",
            delay,
            reminder_id
        );
        let handle = self.create_reminder_task(reminder_id.clone(), delay);
        tasks.insert(reminder_id.clone(), handle);

        Ok(ScheduleOutcome::Scheduled(ScheduledReminder::new(reminder_id)))
    }

    async fn cancel_reminder(&self, id: &ReminderId) -> anyhow::Result<()> {
        if let Some(handle) = self.tasks.write().await.remove(id) {
            handle.cancellation_token.cancel();
            Ok(())
        } else {
            anyhow::bail!("No such reminder")
        }
    }
}

async fn fire_reminder(
    reminder_id: &ReminderId,
    store: &ReminderStore,
    delivery: &dyn ReminderDeliveryChannel,
) {
    let Some(reminder) = store.get(reminder_id).await else {
        log::debug!(
            "[FIRE] Reminder no longer exists, nothing to deliver. ReminderId {}",
            reminder_id
        );
        return;
    };

    log::info!(
        "[FIRE] Delivering reminder. ReminderId {}, ChatId {}",
        reminder_id,
        reminder.chat_id
    );

    if let Err(error) = delivery.send_reminder_notification(&reminder).await {
        log::warn!(
            "Could not deliver reminder, it will not be retried. [reminder_id = {}, error = {}]",
            reminder_id,
            error
        );
    }

    store.remove(reminder_id).await;
}

/// Time left until `due_at`, or `None` when it is already due.
pub(crate) fn get_target_delay(due_at: &DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (*due_at - now)
        .to_std()
        .ok()
        .filter(|delay| !delay.is_zero())
}
