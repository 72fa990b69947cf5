mod delivery;
mod delivery_scheduler;

use async_trait::async_trait;

use crate::models::reminder::{Reminder, ReminderId};

pub use delivery::ReminderDeliveryChannel;
pub use delivery_scheduler::DeliveryReminderScheduler;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReminder {
    id: ReminderId,
}

impl ScheduledReminder {
    pub fn new(id: ReminderId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &ReminderId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled(ScheduledReminder),
    /// The reminder was already due and has been dropped from the store undelivered.
    Expired,
}

#[async_trait]
pub trait ReminderScheduler: Send + Sync + 'static {
    async fn schedule_reminder(&self, reminder: Reminder) -> anyhow::Result<ScheduleOutcome>;

    async fn cancel_reminder(&self, id: &ReminderId) -> anyhow::Result<()>;
}
