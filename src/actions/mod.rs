mod messages;

use std::{collections::HashSet, sync::Arc};

use chrono::{TimeDelta, Utc};
use chrono_tz::Tz;

use crate::{
    assistant::Action,
    dates::DateResolver,
    models::{
        chat::{ChatId, OutgoingMessage},
        reminder::Reminder,
    },
    scheduling::{ReminderScheduler, ScheduleOutcome},
    storage::{InsertOutcome, NewReminder, ReminderStore},
    transport::ChatTransport,
};

/// How close in time two reminders with the same text must be to count as one.
const DUPLICATE_WINDOW_SECONDS: i64 = 60;

/// Who the actions are executed for.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    pub chat_id: ChatId,
    pub user: Option<String>,
}

/// Executes parsed actions against the invoking chat's reminders and reports
/// the outcome of each one back to the chat.
pub struct ActionDispatcher {
    store: Arc<ReminderStore>,
    scheduler: Arc<dyn ReminderScheduler>,
    resolver: Arc<dyn DateResolver>,
    transport: Arc<dyn ChatTransport>,
    timezone: Tz,
}

impl ActionDispatcher {
    pub fn new(
        store: Arc<ReminderStore>,
        scheduler: Arc<dyn ReminderScheduler>,
        resolver: Arc<dyn DateResolver>,
        transport: Arc<dyn ChatTransport>,
        timezone: Tz,
    ) -> Self {
        Self {
            store,
            scheduler,
            resolver,
            transport,
            timezone,
        }
    }

    /// Runs `actions` in order. No action's outcome affects the next one.
    ///
    /// `prose_sent` tells whether the model's own text already reached the chat,
    /// in which case an empty `list` stays silent.
    pub async fn dispatch(&self, context: &DispatchContext, actions: Vec<Action>, prose_sent: bool) {
        for action in actions {
            let reply = match action {
                Action::Remind { text, time } => Some(self.remind(context, &text, &time).await),
                Action::List => self.list(context.chat_id, prose_sent).await,
                Action::Delete { keyword } => Some(self.delete(context.chat_id, &keyword).await),
                Action::ClearAll => Some(self.clear_all(context.chat_id).await),
                Action::Unknown => None,
            };

            let Some(reply) = reply else {
                continue;
            };

            if let Err(error) = self
                .transport
                .send(OutgoingMessage::html(context.chat_id, reply))
                .await
            {
                log::warn!(
                    "Could not send action reply. [chat_id = {}, error = {}]",
                    context.chat_id,
                    error
                );
            }
        }
    }

    async fn remind(&self, context: &DispatchContext, text: &str, time: &str) -> String {
        let text = text.trim();
        if text.is_empty() {
            return messages::empty_reminder_text();
        }

        let now = Utc::now();
        let Some(due_at) = self.resolver.resolve(time, now) else {
            log::info!(
                "Could not resolve reminder time. [chat_id = {}, time = {}]",
                context.chat_id,
                time
            );
            return messages::unresolved_time(time);
        };

        if due_at <= now {
            return messages::time_in_past(time);
        }

        let new_reminder = NewReminder {
            chat_id: context.chat_id,
            text: text.to_owned(),
            due_at,
            user: context.user.clone(),
        };

        let reminder = match self
            .store
            .insert_unless_duplicate(new_reminder, TimeDelta::seconds(DUPLICATE_WINDOW_SECONDS))
            .await
        {
            InsertOutcome::Inserted(reminder) => reminder,
            InsertOutcome::Duplicate(existing) => {
                log::info!(
                    "Skipping duplicate reminder. [reminder_id = {}, chat_id = {}]",
                    existing.id,
                    existing.chat_id
                );
                return messages::duplicate(&existing, &self.timezone);
            }
        };

        match self.scheduler.schedule_reminder(reminder.clone()).await {
            Ok(ScheduleOutcome::Scheduled(scheduled)) => {
                log::debug!("Reminder armed. [reminder_id = {}]", scheduled.id());
                messages::created(&reminder, &self.timezone)
            }
            Ok(ScheduleOutcome::Expired) => messages::time_in_past(time),
            Err(error) => {
                log::error!(
                    "Could not schedule reminder, removing it. [reminder_id = {}, error = {}]",
                    reminder.id,
                    error
                );
                self.store.remove(&reminder.id).await;
                messages::scheduling_failed(&reminder.text)
            }
        }
    }

    async fn list(&self, chat_id: ChatId, prose_sent: bool) -> Option<String> {
        let mut seen = HashSet::new();
        let mut reminders: Vec<Reminder> = self
            .store
            .chat_reminders(chat_id)
            .await
            .into_iter()
            .filter(|reminder| seen.insert((reminder.text.clone(), reminder.due_at)))
            .collect();

        if reminders.is_empty() {
            return (!prose_sent).then(messages::empty_list);
        }

        reminders.sort_by_key(|reminder| reminder.due_at);
        let today = Utc::now().with_timezone(&self.timezone).date_naive();

        Some(messages::list(&reminders, &self.timezone, today))
    }

    async fn delete(&self, chat_id: ChatId, keyword: &str) -> String {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return messages::delete_without_keyword();
        }

        let removed = self.store.remove_matching(chat_id, keyword).await;
        if removed.is_empty() {
            return messages::delete_not_found(keyword);
        }

        self.cancel_timers(&removed).await;
        log::info!(
            "Deleted reminders. [chat_id = {}, keyword = {}, count = {}]",
            chat_id,
            keyword,
            removed.len()
        );

        messages::deleted(keyword, removed.len())
    }

    async fn clear_all(&self, chat_id: ChatId) -> String {
        let removed = self.store.clear_chat(chat_id).await;
        if removed.is_empty() {
            return messages::already_empty();
        }

        self.cancel_timers(&removed).await;
        log::info!(
            "Cleared reminders. [chat_id = {}, count = {}]",
            chat_id,
            removed.len()
        );

        messages::cleared(removed.len())
    }

    async fn cancel_timers(&self, removed: &[Reminder]) {
        for reminder in removed {
            if let Err(error) = self.scheduler.cancel_reminder(&reminder.id).await {
                log::debug!(
                    "No timer to cancel. [reminder_id = {}, error = {}]",
                    reminder.id,
                    error
                );
            }
        }
    }
}

#[cfg(test)]
mod tests;
