use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use teloxide::utils::html::escape;

use crate::models::reminder::Reminder;

const WEEKDAYS: [&str; 7] = [
    "понедельник",
    "вторник",
    "среда",
    "четверг",
    "пятница",
    "суббота",
    "воскресенье",
];

const MONTHS: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

pub fn created(reminder: &Reminder, timezone: &Tz) -> String {
    format!(
        "✍️ <b>Добавлено напоминание:</b> \"{}\"\n⏰ {}",
        escape(&reminder.text),
        format_due_at(&reminder.local_due_at(timezone))
    )
}

pub fn duplicate(existing: &Reminder, timezone: &Tz) -> String {
    format!(
        "ℹ️ Такое напоминание уже есть: \"{}\"\n⏰ {}",
        escape(&existing.text),
        format_due_at(&existing.local_due_at(timezone))
    )
}

pub fn unresolved_time(time: &str) -> String {
    format!(
        "⚠️ Не смог понять время для напоминания: \"{}\"",
        escape(time)
    )
}

pub fn time_in_past(time: &str) -> String {
    format!(
        "⚠️ Время \"{}\" уже прошло, напоминание не создано.",
        escape(time)
    )
}

pub fn empty_reminder_text() -> String {
    "⚠️ Не понял, о чём напомнить.".to_owned()
}

pub fn scheduling_failed(text: &str) -> String {
    format!(
        "⚠️ Не удалось запланировать напоминание: \"{}\"",
        escape(text)
    )
}

pub fn empty_list() -> String {
    "📂 Список напоминаний пуст.".to_owned()
}

/// Reminders grouped by local calendar day. Expects `reminders` sorted by due time.
pub fn list(reminders: &[Reminder], timezone: &Tz, today: NaiveDate) -> String {
    let mut text = "📋 <b>Ваши напоминания:</b>".to_owned();
    let mut current_day = None;

    for reminder in reminders {
        let due_at = reminder.local_due_at(timezone);
        let day = due_at.date_naive();

        if current_day != Some(day) {
            text.push_str(&format!("\n\n📅 <b>{}</b>", day_header(day, today)));
            current_day = Some(day);
        }

        text.push_str(&format!(
            "\n🔹 {} — {}",
            due_at.format("%H:%M"),
            escape(&reminder.text)
        ));
        if let Some(user) = &reminder.user {
            text.push_str(&format!(" ({})", escape(user)));
        }
    }

    text
}

pub fn deleted(keyword: &str, count: usize) -> String {
    if count == 1 {
        format!("🗑 Напоминание с \"{}\" удалено.", escape(keyword))
    } else {
        format!(
            "🗑 Удалено напоминаний с \"{}\": {}.",
            escape(keyword),
            count
        )
    }
}

pub fn delete_not_found(keyword: &str) -> String {
    format!("🤷‍♂️ Не нашел напоминания с \"{}\".", escape(keyword))
}

pub fn delete_without_keyword() -> String {
    "⚠️ Не понял, какое напоминание удалить.".to_owned()
}

pub fn cleared(count: usize) -> String {
    format!("🧹 Все напоминания удалены ({count}).")
}

pub fn already_empty() -> String {
    "📂 Напоминаний и так нет.".to_owned()
}

fn format_due_at(due_at: &DateTime<Tz>) -> String {
    due_at.format("%d.%m.%Y, %H:%M").to_string()
}

fn day_header(day: NaiveDate, today: NaiveDate) -> String {
    let weekday = WEEKDAYS[day.weekday().num_days_from_monday() as usize];
    let month = MONTHS[day.month0() as usize];

    if day.year() == today.year() {
        format!("{}, {} {}", weekday, day.day(), month)
    } else {
        format!("{}, {} {} {}", weekday, day.day(), month, day.year())
    }
}
