use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    assistant::AssistantGateway,
    dates::DateResolver,
    models::{
        chat::{ChatId, OutgoingMessage},
        reminder::{Reminder, ReminderId},
    },
    scheduling::{ReminderScheduler, ScheduleOutcome, ScheduledReminder},
    transport::ChatTransport,
};

pub fn reminder(id: &str, chat_id: ChatId, text: &str, due_at: DateTime<Utc>) -> Reminder {
    Reminder {
        id: ReminderId::from(id),
        chat_id,
        text: text.to_owned(),
        due_at,
        user: None,
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMessage>>,
    typing: Mutex<Vec<ChatId>>,
    fail: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|message| message.text).collect()
    }

    pub fn typing(&self) -> Vec<ChatId> {
        self.typing.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, message: OutgoingMessage) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(message);
        if self.fail {
            anyhow::bail!("chat is unreachable")
        }
        Ok(())
    }

    async fn send_typing(&self, chat_id: ChatId) -> anyhow::Result<()> {
        self.typing.lock().unwrap().push(chat_id);
        Ok(())
    }
}

/// Resolves every expression to the same instant, or to nothing.
pub struct FixedDateResolver(pub Option<DateTime<Utc>>);

impl DateResolver for FixedDateResolver {
    fn resolve(&self, _text: &str, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.0
    }
}

/// Replies with a canned text and records the prompts it was given.
pub struct StubGateway {
    reply: Result<String, String>,
    requests: Mutex<Vec<(String, String)>>,
}

impl StubGateway {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_owned()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err("connection reset".to_owned()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssistantGateway for StubGateway {
    async fn complete(&self, system_prompt: &str, user_text: &str) -> anyhow::Result<String> {
        self.requests
            .lock()
            .unwrap()
            .push((system_prompt.to_owned(), user_text.to_owned()));

        match &self.reply {
            Ok(reply) => Ok(reply.clone()),
            Err(error) => Err(anyhow::anyhow!(error.clone())),
        }
    }
}

#[derive(Default, Clone)]
pub struct RecordingScheduler {
    pub scheduled: Arc<Mutex<Vec<ReminderId>>>,
    pub cancelled: Arc<Mutex<Vec<ReminderId>>>,
}

impl RecordingScheduler {
    pub fn scheduled(&self) -> Vec<ReminderId> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<ReminderId> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderScheduler for RecordingScheduler {
    async fn schedule_reminder(&self, reminder: Reminder) -> anyhow::Result<ScheduleOutcome> {
        self.scheduled.lock().unwrap().push(reminder.id.clone());
        Ok(ScheduleOutcome::Scheduled(ScheduledReminder::new(reminder.id)))
    }

    async fn cancel_reminder(&self, id: &ReminderId) -> anyhow::Result<()> {
        self.cancelled.lock().unwrap().push(id.clone());
        Ok(())
    }
}
