use async_trait::async_trait;

use crate::models::reminder::Reminder;

#[async_trait]
pub trait ReminderDeliveryChannel: Send + Sync + 'static {
    async fn send_reminder_notification(&self, reminder: &Reminder) -> anyhow::Result<()>;
}
