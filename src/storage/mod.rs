mod model;
mod reminder_store;
mod snapshot;

pub use model::NewReminder;
pub use reminder_store::{InsertOutcome, ReminderStore};
pub use snapshot::{InMemorySnapshotStorage, JsonFileStorage, SnapshotError, SnapshotStorage};

#[cfg(test)]
mod tests;
