use std::sync::Arc;

use async_trait::async_trait;
use teloxide::utils::html;

use crate::{
    models::{
        chat::{ChatId, OutgoingMessage},
        reminder::Reminder,
    },
    scheduling::ReminderDeliveryChannel,
};

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    async fn send(&self, message: OutgoingMessage) -> anyhow::Result<()>;

    async fn send_typing(&self, _chat_id: ChatId) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Delivers fired reminders as chat messages.
pub struct TransportDeliveryChannel {
    transport: Arc<dyn ChatTransport>,
}

impl TransportDeliveryChannel {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl ReminderDeliveryChannel for TransportDeliveryChannel {
    async fn send_reminder_notification(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let message = OutgoingMessage::html(reminder.chat_id, get_notification_text(reminder));
        self.transport.send(message).await
    }
}

fn get_notification_text(reminder: &Reminder) -> String {
    let mut text = format!(
        "🔔 <b>НАПОМИНАНИЕ!</b>\n\n📝 \"{}\"",
        html::escape(&reminder.text)
    );

    if let Some(user) = &reminder.user {
        text.push_str(&format!("\n👤 Для: {}", html::escape(user)));
    }

    text
}
