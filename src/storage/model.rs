use chrono::{DateTime, TimeDelta, Utc};

use crate::models::{
    chat::ChatId,
    reminder::{Reminder, ReminderId},
};

pub struct NewReminder {
    pub chat_id: ChatId,
    pub text: String,
    pub due_at: DateTime<Utc>,
    pub user: Option<String>,
}

impl NewReminder {
    /// Same chat, same text ignoring case, due within `window` of each other.
    pub(crate) fn duplicates(&self, existing: &Reminder, window: TimeDelta) -> bool {
        existing.chat_id == self.chat_id
            && existing.text.to_lowercase() == self.text.to_lowercase()
            && (existing.due_at - self.due_at).abs() <= window
    }

    pub(crate) fn into_reminder(self, id: ReminderId) -> Reminder {
        Reminder {
            id,
            chat_id: self.chat_id,
            text: self.text,
            due_at: self.due_at,
            user: self.user,
        }
    }
}
