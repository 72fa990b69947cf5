use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::models::reminder::Reminder;

use super::command::{BLOCK_END, BLOCK_START};

/// Instructions sent with every request: persona, current time, the chat's
/// reminders and the command block contract understood by `parse_reply`.
pub fn build_system_prompt(now: DateTime<Utc>, timezone: &Tz, reminders: &[Reminder]) -> String {
    let local_now = now.with_timezone(timezone).format("%d.%m.%Y, %H:%M:%S");

    let reminders_context = if reminders.is_empty() {
        "Список пуст.".to_owned()
    } else {
        let lines = reminders
            .iter()
            .map(|reminder| {
                format!(
                    "- {} ({})",
                    reminder.text,
                    reminder.local_due_at(timezone).format("%d.%m %H:%M")
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!("ТЕКУЩИЕ НАПОМИНАНИЯ:\n{lines}")
    };

    format!(
        r#"Ты — умный строительный ассистент и секретарь. Время: {local_now} ({timezone}).
{reminders_context}

ИНСТРУКЦИЯ ПО ОТВЕТАМ:
1. Сначала ответь на вопрос пользователя текстом (про укладку, пироги пола и т.д.).
2. Если пользователь просит что-то сделать (напомнить, удалить, показать список, очистить все напоминания) — добавь специальный блок КОМАНДЫ в конце ответа.

ФОРМАТ КОМАНДЫ (пиши строго в конце сообщения):
{BLOCK_START}
{{"actions": [
   {{"type": "remind", "text": "...", "time": "..."}},
   {{"type": "list"}},
   {{"type": "delete", "keyword": "..."}},
   {{"type": "clear_all"}}
]}}
{BLOCK_END}

Поле "time" пиши по-русски относительно текущего времени: "через 2 часа", "завтра в 9:00", "в пятницу в 18:00", "15.06 в 10:00".

ПРИМЕР 1 (Вопрос + Напоминание):
Пользователь: "Как мешать бетон? Напомни купить цемент через час."
Твой ответ:
Для бетона нужна пропорция 1:3:5...
{BLOCK_START}
{{"actions": [{{"type": "remind", "text": "Купить цемент", "time": "через час"}}]}}
{BLOCK_END}

ПРИМЕР 2 (Мульти-команда):
Пользователь: "Напомни позвонить маме в 5 и покажи список."
Твой ответ:
Сделано!
{BLOCK_START}
{{"actions": [
   {{"type": "remind", "text": "Позвонить маме", "time": "в 17:00"}},
   {{"type": "list"}}
]}}
{BLOCK_END}

ПРИМЕР 3 (Удаление):
Пользователь: "Удали напоминание про цемент."
Твой ответ:
Удаляю.
{BLOCK_START}
{{"actions": [{{"type": "delete", "keyword": "цемент"}}]}}
{BLOCK_END}

Если команд нет, просто отвечай текстом без тегов JSON."#
    )
}
