use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use super::super::{
    InMemorySnapshotStorage, InsertOutcome, NewReminder, ReminderStore, SnapshotError,
    SnapshotStorage,
};
use crate::models::{chat::ChatId, reminder::Reminder};
use crate::test_utils::reminder;

fn window() -> TimeDelta {
    TimeDelta::seconds(60)
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn new_reminder(chat_id: ChatId, text: &str, due_at: DateTime<Utc>) -> NewReminder {
    NewReminder {
        chat_id,
        text: text.to_owned(),
        due_at,
        user: Some("Иван".to_owned()),
    }
}

async fn store_with(reminders: Vec<Reminder>) -> (ReminderStore, Arc<InMemorySnapshotStorage>) {
    let storage = Arc::new(InMemorySnapshotStorage::with_reminders(reminders));
    let store = ReminderStore::open(storage.clone()).await;
    (store, storage)
}

struct FailingStorage;

#[async_trait]
impl SnapshotStorage for FailingStorage {
    async fn load(&self) -> Vec<Reminder> {
        Vec::new()
    }

    async fn save(&self, _reminders: &[Reminder]) -> Result<(), SnapshotError> {
        Err(std::io::Error::other("disk full").into())
    }
}

#[tokio::test]
async fn near_duplicate_in_same_chat_is_not_inserted() {
    let (store, storage) = store_with(vec![]).await;

    let first = store
        .insert_unless_duplicate(new_reminder(1, "Купить цемент", base_time()), window())
        .await;
    let second = store
        .insert_unless_duplicate(
            new_reminder(1, "купить ЦЕМЕНТ", base_time() + TimeDelta::seconds(45)),
            window(),
        )
        .await;

    let InsertOutcome::Inserted(created) = first else {
        panic!("first reminder should be inserted");
    };
    assert_eq!(second, InsertOutcome::Duplicate(created.clone()));
    assert_eq!(store.all().await, vec![created.clone()]);
    assert_eq!(storage.snapshot().await, vec![created]);
}

#[tokio::test]
async fn same_text_outside_window_or_in_other_chat_is_inserted() {
    let (store, _) = store_with(vec![]).await;

    store
        .insert_unless_duplicate(new_reminder(1, "Купить цемент", base_time()), window())
        .await;
    let later = store
        .insert_unless_duplicate(
            new_reminder(1, "Купить цемент", base_time() + TimeDelta::seconds(61)),
            window(),
        )
        .await;
    let other_chat = store
        .insert_unless_duplicate(new_reminder(2, "Купить цемент", base_time()), window())
        .await;

    assert!(matches!(later, InsertOutcome::Inserted(_)));
    assert!(matches!(other_chat, InsertOutcome::Inserted(_)));
    assert_eq!(store.all().await.len(), 3);
}

#[tokio::test]
async fn generated_ids_are_unique() {
    let (store, _) = store_with(vec![]).await;

    for minute in 0..5 {
        store
            .insert_unless_duplicate(
                new_reminder(1, "Проверить опалубку", base_time() + TimeDelta::minutes(minute * 5)),
                window(),
            )
            .await;
    }

    let mut ids: Vec<_> = store.all().await.into_iter().map(|r| r.id).collect();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn remove_matching_is_case_insensitive_and_scoped_to_chat() {
    let (store, storage) = store_with(vec![
        reminder("a", 1, "Купить Цемент М500", base_time()),
        reminder("b", 1, "Позвонить маме", base_time()),
        reminder("c", 2, "Купить цемент", base_time()),
    ])
    .await;

    let removed = store.remove_matching(1, "цемент").await;

    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id.as_str(), "a");
    let remaining: Vec<_> = storage
        .snapshot()
        .await
        .into_iter()
        .map(|r| r.id.as_str().to_owned())
        .collect();
    assert_eq!(remaining, vec!["b", "c"]);
}

#[tokio::test]
async fn clear_chat_leaves_other_chats_untouched() {
    let (store, _) = store_with(vec![
        reminder("a", 1, "Первое", base_time()),
        reminder("b", 2, "Второе", base_time()),
        reminder("c", 1, "Третье", base_time()),
    ])
    .await;

    let cleared = store.clear_chat(1).await;

    assert_eq!(cleared.len(), 2);
    assert!(store.chat_reminders(1).await.is_empty());
    assert_eq!(store.chat_reminders(2).await.len(), 1);
    assert!(store.clear_chat(1).await.is_empty());
}

#[tokio::test]
async fn remove_expired_drops_only_past_due() {
    let now = base_time();
    let (store, _) = store_with(vec![
        reminder("past", 1, "Вчера", now - TimeDelta::days(1)),
        reminder("now", 1, "Сейчас", now),
        reminder("future", 1, "Завтра", now + TimeDelta::days(1)),
    ])
    .await;

    let expired = store.remove_expired(now).await;

    assert_eq!(expired.len(), 2);
    assert!(store.contains(&"future".into()).await);
    assert!(!store.contains(&"past".into()).await);
}

#[tokio::test]
async fn remove_is_idempotent() {
    let (store, _) = store_with(vec![reminder("a", 1, "Первое", base_time())]).await;

    assert!(store.remove(&"a".into()).await.is_some());
    assert!(store.remove(&"a".into()).await.is_none());
}

#[tokio::test]
async fn failed_save_keeps_in_memory_state() {
    let store = ReminderStore::open(Arc::new(FailingStorage)).await;

    let outcome = store
        .insert_unless_duplicate(new_reminder(1, "Купить цемент", base_time()), window())
        .await;

    assert!(matches!(outcome, InsertOutcome::Inserted(_)));
    assert_eq!(store.chat_reminders(1).await.len(), 1);
}
