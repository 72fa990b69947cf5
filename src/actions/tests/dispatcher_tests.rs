use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Europe;

use super::super::{ActionDispatcher, DispatchContext};
use crate::{
    assistant::Action,
    models::{
        chat::MessageFormat,
        reminder::{Reminder, ReminderId},
    },
    storage::{InMemorySnapshotStorage, ReminderStore},
    test_utils::{FixedDateResolver, RecordingScheduler, RecordingTransport, reminder},
};

struct TestContext {
    store: Arc<ReminderStore>,
    storage: Arc<InMemorySnapshotStorage>,
    scheduler: RecordingScheduler,
    transport: Arc<RecordingTransport>,
    dispatcher: ActionDispatcher,
}

impl TestContext {
    async fn new(reminders: Vec<Reminder>, resolved: Option<DateTime<Utc>>) -> Self {
        Self::with_transport(reminders, resolved, RecordingTransport::new()).await
    }

    async fn with_transport(
        reminders: Vec<Reminder>,
        resolved: Option<DateTime<Utc>>,
        transport: RecordingTransport,
    ) -> Self {
        let storage = Arc::new(InMemorySnapshotStorage::with_reminders(reminders));
        let store = Arc::new(ReminderStore::open(storage.clone()).await);
        let scheduler = RecordingScheduler::default();
        let transport = Arc::new(transport);
        let dispatcher = ActionDispatcher::new(
            store.clone(),
            Arc::new(scheduler.clone()),
            Arc::new(FixedDateResolver(resolved)),
            transport.clone(),
            Europe::Moscow,
        );

        Self {
            store,
            storage,
            scheduler,
            transport,
            dispatcher,
        }
    }

    async fn dispatch(&self, chat_id: i64, actions: Vec<Action>, prose_sent: bool) {
        let context = DispatchContext {
            chat_id,
            user: Some("Иван".to_owned()),
        };
        self.dispatcher.dispatch(&context, actions, prose_sent).await;
    }
}

fn remind(text: &str, time: &str) -> Action {
    Action::Remind {
        text: text.to_owned(),
        time: time.to_owned(),
    }
}

fn delete(keyword: &str) -> Action {
    Action::Delete {
        keyword: keyword.to_owned(),
    }
}

fn ids(ids: &[&str]) -> Vec<ReminderId> {
    ids.iter().map(|id| ReminderId::from(*id)).collect()
}

fn in_hours(hours: i64) -> DateTime<Utc> {
    Utc::now() + TimeDelta::hours(hours)
}

#[tokio::test]
async fn remind_creates_persists_schedules_and_confirms() {
    let due_at = in_hours(1);
    let ctx = TestContext::new(vec![], Some(due_at)).await;

    ctx.dispatch(1, vec![remind("Купить цемент", "через час")], false).await;

    let stored = ctx.store.all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].chat_id, 1);
    assert_eq!(stored[0].text, "Купить цемент");
    assert_eq!(stored[0].due_at, due_at);
    assert_eq!(stored[0].user.as_deref(), Some("Иван"));
    assert_eq!(ctx.storage.snapshot().await, stored);
    assert_eq!(ctx.scheduler.scheduled(), vec![stored[0].id.clone()]);

    let sent = ctx.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].format, MessageFormat::Html);
    assert!(sent[0].text.starts_with("✍️ <b>Добавлено напоминание:</b> \"Купить цемент\""));
}

#[tokio::test]
async fn near_duplicate_reminds_create_one_reminder() {
    let due_at = in_hours(2);
    let ctx = TestContext::new(vec![], Some(due_at)).await;

    ctx.dispatch(
        1,
        vec![
            remind("Купить цемент", "через 2 часа"),
            remind("купить ЦЕМЕНТ", "через 2 часа"),
        ],
        true,
    )
    .await;

    assert_eq!(ctx.store.all().await.len(), 1);
    assert_eq!(ctx.scheduler.scheduled().len(), 1);
    let texts = ctx.transport.sent_texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].starts_with("ℹ️ Такое напоминание уже есть"));
}

#[tokio::test]
async fn unresolved_time_is_reported_by_name() {
    let ctx = TestContext::new(vec![], None).await;

    ctx.dispatch(1, vec![remind("Позвонить", "когда-нибудь")], false).await;

    assert!(ctx.store.all().await.is_empty());
    assert!(ctx.scheduler.scheduled().is_empty());
    assert_eq!(
        ctx.transport.sent_texts(),
        vec!["⚠️ Не смог понять время для напоминания: \"когда-нибудь\"".to_owned()]
    );
}

#[tokio::test]
async fn time_in_the_past_creates_nothing() {
    let ctx = TestContext::new(vec![], Some(in_hours(-1))).await;

    ctx.dispatch(1, vec![remind("Позвонить", "вчера")], false).await;

    assert!(ctx.store.all().await.is_empty());
    assert!(ctx.transport.sent_texts()[0].contains("уже прошло"));
}

#[tokio::test]
async fn blank_reminder_text_is_rejected() {
    let ctx = TestContext::new(vec![], Some(in_hours(1))).await;

    ctx.dispatch(1, vec![remind("   ", "через час")], false).await;

    assert!(ctx.store.all().await.is_empty());
    assert_eq!(ctx.transport.sent().len(), 1);
}

#[tokio::test]
async fn empty_list_is_announced_without_prose() {
    let ctx = TestContext::new(vec![], None).await;

    ctx.dispatch(1, vec![Action::List], false).await;

    assert_eq!(
        ctx.transport.sent_texts(),
        vec!["📂 Список напоминаний пуст.".to_owned()]
    );
}

#[tokio::test]
async fn empty_list_is_silent_after_prose() {
    let ctx = TestContext::new(vec![], None).await;

    ctx.dispatch(1, vec![Action::List], true).await;

    assert!(ctx.transport.sent().is_empty());
}

#[tokio::test]
async fn list_deduplicates_sorts_and_stays_in_chat() {
    let early = in_hours(1);
    let late = in_hours(3);
    let ctx = TestContext::new(
        vec![
            reminder("a", 1, "Второе", late),
            reminder("b", 1, "Первое", early),
            reminder("c", 1, "Первое", early),
            reminder("d", 2, "Чужое", early),
        ],
        None,
    )
    .await;

    ctx.dispatch(1, vec![Action::List], true).await;

    let texts = ctx.transport.sent_texts();
    assert_eq!(texts.len(), 1);
    let list = &texts[0];
    assert!(list.starts_with("📋 <b>Ваши напоминания:</b>"));
    assert_eq!(list.matches("Первое").count(), 1);
    assert!(!list.contains("Чужое"));
    let first = list.find("Первое").unwrap();
    let second = list.find("Второе").unwrap();
    assert!(first < second, "Entries should be in due order: {list}");
}

#[tokio::test]
async fn list_includes_reminder_created_earlier_in_the_same_reply() {
    let ctx = TestContext::new(vec![], Some(in_hours(1))).await;

    ctx.dispatch(1, vec![remind("Позвонить маме", "в 17:00"), Action::List], true).await;

    let texts = ctx.transport.sent_texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("Позвонить маме"));
}

#[tokio::test]
async fn delete_only_touches_matching_reminders_in_invoking_chat() {
    let ctx = TestContext::new(
        vec![
            reminder("a", 1, "Купить ЦЕМЕНТ", in_hours(1)),
            reminder("b", 1, "Позвонить прорабу", in_hours(2)),
            reminder("c", 2, "Купить цемент", in_hours(1)),
        ],
        None,
    )
    .await;

    ctx.dispatch(1, vec![delete("цемент")], false).await;

    let left: Vec<_> = ctx.store.all().await.into_iter().map(|r| r.id).collect();
    assert_eq!(left, ids(&["b", "c"]));
    assert_eq!(ctx.scheduler.cancelled(), ids(&["a"]));
    assert_eq!(
        ctx.transport.sent_texts(),
        vec!["🗑 Напоминание с \"цемент\" удалено.".to_owned()]
    );
}

#[tokio::test]
async fn delete_reports_not_found_and_blank_keywords() {
    let ctx = TestContext::new(vec![reminder("a", 1, "Купить цемент", in_hours(1))], None).await;

    ctx.dispatch(1, vec![delete("кирпич"), delete("  ")], false).await;

    assert_eq!(ctx.store.all().await.len(), 1);
    let texts = ctx.transport.sent_texts();
    assert_eq!(texts[0], "🤷‍♂️ Не нашел напоминания с \"кирпич\".");
    assert_eq!(texts[1], "⚠️ Не понял, какое напоминание удалить.");
}

#[tokio::test]
async fn clear_all_on_empty_chat_reports_already_empty() {
    let ctx = TestContext::new(vec![reminder("a", 2, "Чужое", in_hours(1))], None).await;

    ctx.dispatch(1, vec![Action::ClearAll], false).await;

    assert_eq!(ctx.store.all().await.len(), 1);
    assert!(ctx.scheduler.cancelled().is_empty());
    assert_eq!(
        ctx.transport.sent_texts(),
        vec!["📂 Напоминаний и так нет.".to_owned()]
    );
}

#[tokio::test]
async fn clear_all_removes_whole_chat_and_cancels_timers() {
    let ctx = TestContext::new(
        vec![
            reminder("a", 1, "Одно", in_hours(1)),
            reminder("b", 1, "Другое", in_hours(2)),
            reminder("c", 2, "Чужое", in_hours(1)),
        ],
        None,
    )
    .await;

    ctx.dispatch(1, vec![Action::ClearAll], false).await;

    let left: Vec<_> = ctx.storage.snapshot().await.into_iter().map(|r| r.id).collect();
    assert_eq!(left, ids(&["c"]));
    assert_eq!(ctx.scheduler.cancelled(), ids(&["a", "b"]));
    assert_eq!(
        ctx.transport.sent_texts(),
        vec!["🧹 Все напоминания удалены (2).".to_owned()]
    );
}

#[tokio::test]
async fn failed_action_does_not_stop_the_rest() {
    let ctx = TestContext::with_transport(
        vec![reminder("a", 1, "Купить цемент", in_hours(1))],
        None,
        RecordingTransport::failing(),
    )
    .await;

    ctx.dispatch(
        1,
        vec![
            remind("Позвонить", "когда-нибудь"),
            Action::Unknown,
            Action::List,
            delete("цемент"),
        ],
        false,
    )
    .await;

    assert_eq!(ctx.transport.sent().len(), 3, "Unknown actions send nothing");
    assert!(ctx.store.all().await.is_empty());
}
