use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::models::{
    chat::ChatId,
    reminder::{Reminder, ReminderId},
};

use super::{NewReminder, SnapshotStorage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Reminder),
    Duplicate(Reminder),
}

/// The single owner of the reminder collection.
///
/// Message handling and timer callbacks both go through this type. Each
/// read-modify-persist sequence holds the lock until the snapshot is written,
/// so concurrent removals cannot overwrite each other's saves.
pub struct ReminderStore {
    reminders: Mutex<Vec<Reminder>>,
    storage: Arc<dyn SnapshotStorage>,
}

impl ReminderStore {
    pub async fn open(storage: Arc<dyn SnapshotStorage>) -> Self {
        let reminders = storage.load().await;

        Self {
            reminders: Mutex::new(reminders),
            storage,
        }
    }

    pub async fn all(&self) -> Vec<Reminder> {
        self.reminders.lock().await.clone()
    }

    pub async fn chat_reminders(&self, chat_id: ChatId) -> Vec<Reminder> {
        self.reminders
            .lock()
            .await
            .iter()
            .filter(|reminder| reminder.chat_id == chat_id)
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &ReminderId) -> Option<Reminder> {
        self.reminders
            .lock()
            .await
            .iter()
            .find(|reminder| &reminder.id == id)
            .cloned()
    }

    #[cfg(test)]
    pub async fn contains(&self, id: &ReminderId) -> bool {
        self.reminders
            .lock()
            .await
            .iter()
            .any(|reminder| &reminder.id == id)
    }

    pub async fn insert_unless_duplicate(
        &self,
        new_reminder: NewReminder,
        window: TimeDelta,
    ) -> InsertOutcome {
        let mut reminders = self.reminders.lock().await;

        if let Some(existing) = reminders
            .iter()
            .find(|existing| new_reminder.duplicates(existing, window))
        {
            return InsertOutcome::Duplicate(existing.clone());
        }

        let reminder = new_reminder.into_reminder(ReminderId::generate());
        reminders.push(reminder.clone());
        self.persist(&reminders).await;

        log::info!(
            "Created reminder. [reminder_id = {}, chat_id = {}]",
            reminder.id,
            reminder.chat_id
        );
        InsertOutcome::Inserted(reminder)
    }

    pub async fn remove(&self, id: &ReminderId) -> Option<Reminder> {
        let mut reminders = self.reminders.lock().await;
        let position = reminders.iter().position(|reminder| &reminder.id == id)?;
        let removed = reminders.remove(position);
        self.persist(&reminders).await;

        Some(removed)
    }

    /// Removes reminders of `chat_id` whose text contains `keyword`, ignoring case.
    pub async fn remove_matching(&self, chat_id: ChatId, keyword: &str) -> Vec<Reminder> {
        let keyword = keyword.to_lowercase();
        self.remove_where(|reminder| {
            reminder.chat_id == chat_id && reminder.text.to_lowercase().contains(&keyword)
        })
        .await
    }

    pub async fn clear_chat(&self, chat_id: ChatId) -> Vec<Reminder> {
        self.remove_where(|reminder| reminder.chat_id == chat_id)
            .await
    }

    pub async fn remove_expired(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        self.remove_where(|reminder| reminder.is_due(now)).await
    }

    async fn remove_where(&self, predicate: impl Fn(&Reminder) -> bool) -> Vec<Reminder> {
        let mut reminders = self.reminders.lock().await;
        let (removed, kept): (Vec<_>, Vec<_>) =
            reminders.drain(..).partition(|reminder| predicate(reminder));
        *reminders = kept;

        if !removed.is_empty() {
            self.persist(&reminders).await;
        }

        removed
    }

    async fn persist(&self, reminders: &[Reminder]) {
        if let Err(error) = self.storage.save(reminders).await {
            log::error!(
                "Could not save reminder snapshot, keeping in-memory state. [reminders = {}, error = {}]",
                reminders.len(),
                error
            );
        }
    }
}
