use std::sync::OnceLock;

use chrono::{Datelike, DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use regex::Regex;

/// What a time expression means before it is anchored to "now".
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expression {
    Absolute(DateTime<FixedOffset>),
    Local(NaiveDateTime),
    Relative { delta: TimeDelta, months: u32 },
    Calendar(CalendarParts),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct CalendarParts {
    pub day: Option<DayAnchor>,
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum DayAnchor {
    DaysFromToday(i64),
    Weekday(Weekday),
    Date { day: u32, month: u32, year: Option<i32> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Meridiem {
    Am,
    Pm,
    Night,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PartOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl PartOfDay {
    fn default_time(self) -> NaiveTime {
        let hour = match self {
            PartOfDay::Morning => 9,
            PartOfDay::Afternoon => 13,
            PartOfDay::Evening => 19,
            PartOfDay::Night => 23,
        };
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
    }

    fn as_meridiem(self) -> Option<Meridiem> {
        match self {
            PartOfDay::Morning => None,
            PartOfDay::Afternoon | PartOfDay::Evening => Some(Meridiem::Pm),
            PartOfDay::Night => Some(Meridiem::Night),
        }
    }
}

struct Patterns {
    relative_prefix: Regex,
    iso_date: Regex,
    dotted_date: Regex,
    named_date: Regex,
    day_after_tomorrow: Regex,
    tomorrow: Regex,
    today: Regex,
    weekday: Regex,
    noon: Regex,
    midnight: Regex,
    prefixed_dotted_time: Regex,
    colon_time: Regex,
    prefixed_hour: Regex,
    hour_with_meridiem: Regex,
    part_of_day: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("date pattern must compile");
        let meridiem = r"(?:\s*(утра|дня|вечера|ночи|am|pm|a\.m\.|p\.m\.))?";

        Patterns {
            relative_prefix: compile(r"^(?:через|in)\s+(.+)$"),
            iso_date: compile(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"),
            dotted_date: compile(r"\b(\d{1,2})\.(\d{1,2})(?:\.(\d{4}|\d{2}))?\b"),
            named_date: compile(
                r"\b(\d{1,2})\s+(январ[яь]|феврал[яь]|марта?|апрел[яь]|ма[яй]|июн[яь]|июл[яь]|августа?|сентябр[яь]|октябр[яь]|ноябр[яь]|декабр[яь]|january|february|march|april|may|june|july|august|september|october|november|december)(?:\s+(\d{4}))?\b",
            ),
            day_after_tomorrow: compile(r"\b(?:послезавтра|day after tomorrow)\b"),
            tomorrow: compile(r"\b(?:завтра|tomorrow)\b"),
            today: compile(r"\b(?:сегодня|today)\b"),
            weekday: compile(
                r"\b(понедельник|вторник|сред[аеуы]|четверг|пятниц[аеуы]|суббот[аеуы]|воскресень[еяю]|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            ),
            noon: compile(r"\b(?:полдень|noon)\b"),
            midnight: compile(r"\b(?:полночь|midnight)\b"),
            prefixed_dotted_time: compile(&format!(
                r"\b(?:в|во|к|at|by)\s+(\d{{1,2}})\.(\d{{2}})\b{meridiem}"
            )),
            colon_time: compile(&format!(r"\b(\d{{1,2}}):(\d{{2}})\b{meridiem}")),
            prefixed_hour: compile(&format!(
                r"\b(?:в|во|к|at|by)\s+(\d{{1,2}})(?:\s*(?:часов|часа|час|ч|o'clock))?\b{meridiem}"
            )),
            hour_with_meridiem: compile(
                r"\b(\d{1,2})\s*(утра|дня|вечера|ночи|am|pm|a\.m\.|p\.m\.)",
            ),
            part_of_day: compile(
                r"\b(утром|утра|днем|вечером|ночью|morning|afternoon|evening|tonight|night)\b",
            ),
        }
    })
}

const FILLER_WORDS: &[&str] = &[
    "в", "во", "на", "к", "ко", "до", "и", "at", "on", "by", "the", "next", "this", "and",
    "следующий", "следующую", "следующее", "следующей", "этот", "эту", "это", "этой",
];

pub(super) fn parse(text: &str) -> Option<Expression> {
    let trimmed = text.trim().trim_end_matches(['.', '!', '?']);
    if trimmed.is_empty() {
        return None;
    }

    if let Some(expression) = parse_absolute(trimmed) {
        return Some(expression);
    }

    let normalized = trimmed.to_lowercase().replace('ё', "е");

    if let Some(captures) = patterns().relative_prefix.captures(&normalized) {
        return parse_relative(captures.get(1)?.as_str());
    }

    parse_calendar(&normalized).map(Expression::Calendar)
}

fn parse_absolute(text: &str) -> Option<Expression> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(Expression::Absolute(datetime));
    }

    const LOCAL_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];

    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(Expression::Local)
}

enum DurationUnit {
    Seconds(f64),
    Months,
}

fn parse_relative(rest: &str) -> Option<Expression> {
    let tokens: Vec<&str> = rest
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| c == ',' || c == '.'))
        .filter(|token| !token.is_empty())
        .collect();

    let mut pending: Option<f64> = None;
    let mut seconds = 0f64;
    let mut months = 0u32;
    let mut matched = false;
    let mut index = 0;

    while let Some(token) = tokens.get(index) {
        if let Some(amount) = parse_amount(token) {
            pending = Some(pending.unwrap_or(1.0) * amount);
        } else if let Some(unit) = parse_unit(token) {
            let amount = pending.take().unwrap_or(1.0);
            match unit {
                DurationUnit::Seconds(unit_seconds) => seconds += amount * unit_seconds,
                DurationUnit::Months => {
                    if amount.fract() != 0.0 {
                        return None;
                    }
                    let amount = u32::try_from(amount as u64).ok()?;
                    months = months.checked_add(amount)?;
                }
            }
            matched = true;
        } else if !matches!(*token, "и" | "and") {
            break;
        }
        index += 1;
    }

    if pending.is_some() || !matched {
        return None;
    }

    let delta = TimeDelta::try_milliseconds((seconds * 1000.0).round() as i64)?;
    let remainder = tokens[index..].join(" ");
    if remainder.is_empty() {
        return Some(Expression::Relative { delta, months });
    }

    // "через 2 дня в 10:00": whole days followed by a clock time.
    let whole_days = delta.num_days();
    if months != 0 || delta != TimeDelta::days(whole_days) {
        return None;
    }

    let parts = parse_calendar(&remainder)?;
    if parts.day.is_some() || parts.time.is_none() {
        return None;
    }

    Some(Expression::Calendar(CalendarParts {
        day: Some(DayAnchor::DaysFromToday(whole_days)),
        time: parts.time,
    }))
}

fn parse_amount(token: &str) -> Option<f64> {
    if let Ok(value) = token.replace(',', ".").parse::<f64>() {
        return (value.is_finite() && value >= 0.0).then_some(value);
    }

    let value = match token {
        "a" | "an" | "one" | "один" | "одна" | "одну" | "одной" => 1.0,
        "half" => 0.5,
        "полтора" | "полторы" => 1.5,
        "пару" | "пара" | "couple" | "two" | "два" | "две" => 2.0,
        "three" | "три" => 3.0,
        "four" | "четыре" => 4.0,
        "five" | "пять" => 5.0,
        "six" | "шесть" => 6.0,
        "seven" | "семь" => 7.0,
        "eight" | "восемь" => 8.0,
        "nine" | "девять" => 9.0,
        "ten" | "десять" => 10.0,
        "fifteen" | "пятнадцать" => 15.0,
        "twenty" | "двадцать" => 20.0,
        "thirty" | "тридцать" => 30.0,
        "forty" | "сорок" => 40.0,
        "fifty" | "пятьдесят" => 50.0,
        _ => return None,
    };

    Some(value)
}

fn parse_unit(token: &str) -> Option<DurationUnit> {
    const MINUTE: f64 = 60.0;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;

    let unit = match token {
        "полчаса" => DurationUnit::Seconds(30.0 * MINUTE),
        "полминуты" => DurationUnit::Seconds(30.0),
        "сек" | "секунду" | "секунды" | "секунд" | "s" | "sec" | "secs" | "second" | "seconds" => {
            DurationUnit::Seconds(1.0)
        }
        "мин" | "минуту" | "минута" | "минуты" | "минут" | "m" | "min" | "mins" | "minute"
        | "minutes" => DurationUnit::Seconds(MINUTE),
        "ч" | "час" | "часа" | "часов" | "h" | "hr" | "hrs" | "hour" | "hours" => {
            DurationUnit::Seconds(HOUR)
        }
        "день" | "дня" | "дней" | "дн" | "сутки" | "суток" | "d" | "day" | "days" => {
            DurationUnit::Seconds(DAY)
        }
        "неделю" | "неделя" | "недели" | "недель" | "week" | "weeks" => {
            DurationUnit::Seconds(7.0 * DAY)
        }
        "месяц" | "месяца" | "месяцев" | "month" | "months" => DurationUnit::Months,
        _ => return None,
    };

    Some(unit)
}

fn parse_calendar(text: &str) -> Option<CalendarParts> {
    let patterns = patterns();
    let mut text = text.to_owned();
    let mut parts = CalendarParts::default();

    // Times written as "в 10.30" go first so they are not read as dates.
    let mut clock = match take_match(&mut text, &patterns.prefixed_dotted_time) {
        Some(groups) => Some(clock_from_groups(&groups, 1, Some(2), 3)?),
        None => None,
    };

    parts.day = take_day(&mut text)?;

    if clock.is_none() {
        clock = take_clock(&mut text)?;
    }

    let part_of_day = take_match(&mut text, &patterns.part_of_day)
        .and_then(|groups| groups.get(1).cloned().flatten())
        .and_then(|word| part_of_day_from_word(&word));

    parts.time = match (clock, part_of_day) {
        (Some((hour, minute, meridiem)), hint) => {
            let meridiem = meridiem.or(hint.and_then(PartOfDay::as_meridiem));
            Some(to_time(hour, minute, meridiem)?)
        }
        (None, Some(hint)) => Some(hint.default_time()),
        (None, None) => None,
    };

    let has_leftovers = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|word| !word.is_empty())
        .any(|word| !FILLER_WORDS.contains(&word));

    if has_leftovers || (parts.day.is_none() && parts.time.is_none()) {
        return None;
    }

    Some(parts)
}

/// `Some(None)` when no day is mentioned, `None` when a mentioned day is invalid.
fn take_day(text: &mut String) -> Option<Option<DayAnchor>> {
    let patterns = patterns();

    if let Some(groups) = take_match(text, &patterns.iso_date) {
        let year = group_number(&groups, 1)?;
        return Some(Some(DayAnchor::Date {
            day: group_number(&groups, 3)?,
            month: group_number(&groups, 2)?,
            year: Some(i32::try_from(year).ok()?),
        }));
    }

    if let Some(groups) = take_match(text, &patterns.dotted_date) {
        let year = match group_number(&groups, 3) {
            Some(year) if year < 100 => Some(2000 + year as i32),
            Some(year) => Some(i32::try_from(year).ok()?),
            None => None,
        };
        return Some(Some(DayAnchor::Date {
            day: group_number(&groups, 1)?,
            month: group_number(&groups, 2)?,
            year,
        }));
    }

    if let Some(groups) = take_match(text, &patterns.named_date) {
        let month = groups.get(2).cloned().flatten().and_then(|name| month_from_name(&name))?;
        let year = match group_number(&groups, 3) {
            Some(year) => Some(i32::try_from(year).ok()?),
            None => None,
        };
        return Some(Some(DayAnchor::Date {
            day: group_number(&groups, 1)?,
            month,
            year,
        }));
    }

    if take_match(text, &patterns.day_after_tomorrow).is_some() {
        return Some(Some(DayAnchor::DaysFromToday(2)));
    }
    if take_match(text, &patterns.tomorrow).is_some() {
        return Some(Some(DayAnchor::DaysFromToday(1)));
    }
    if take_match(text, &patterns.today).is_some() {
        return Some(Some(DayAnchor::DaysFromToday(0)));
    }

    if let Some(groups) = take_match(text, &patterns.weekday) {
        let weekday = groups.get(1).cloned().flatten().and_then(|name| weekday_from_name(&name))?;
        return Some(Some(DayAnchor::Weekday(weekday)));
    }

    Some(None)
}

type Clock = (u32, u32, Option<Meridiem>);

fn take_clock(text: &mut String) -> Option<Option<Clock>> {
    let patterns = patterns();

    if take_match(text, &patterns.noon).is_some() {
        return Some(Some((12, 0, None)));
    }
    if take_match(text, &patterns.midnight).is_some() {
        return Some(Some((0, 0, None)));
    }
    if let Some(groups) = take_match(text, &patterns.colon_time) {
        return clock_from_groups(&groups, 1, Some(2), 3).map(Some);
    }
    if let Some(groups) = take_match(text, &patterns.prefixed_hour) {
        return clock_from_groups(&groups, 1, None, 2).map(Some);
    }
    if let Some(groups) = take_match(text, &patterns.hour_with_meridiem) {
        return clock_from_groups(&groups, 1, None, 2).map(Some);
    }

    Some(None)
}

fn clock_from_groups(
    groups: &[Option<String>],
    hour: usize,
    minute: Option<usize>,
    meridiem: usize,
) -> Option<Clock> {
    let hour = group_number(groups, hour)?;
    let minute = match minute {
        Some(index) => group_number(groups, index)?,
        None => 0,
    };
    let meridiem = groups
        .get(meridiem)
        .cloned()
        .flatten()
        .and_then(|word| meridiem_from_word(&word));

    Some((hour, minute, meridiem))
}

fn to_time(hour: u32, minute: u32, meridiem: Option<Meridiem>) -> Option<NaiveTime> {
    if hour > 23 {
        return None;
    }

    let hour = match meridiem {
        Some(Meridiem::Am) if hour == 12 => 0,
        Some(Meridiem::Pm) if hour < 12 => hour + 12,
        Some(Meridiem::Night) if hour == 12 => 0,
        Some(Meridiem::Night) if (6..12).contains(&hour) => hour + 12,
        _ => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn meridiem_from_word(word: &str) -> Option<Meridiem> {
    match word {
        "утра" | "am" | "a.m." => Some(Meridiem::Am),
        "дня" | "вечера" | "pm" | "p.m." => Some(Meridiem::Pm),
        "ночи" => Some(Meridiem::Night),
        _ => None,
    }
}

fn part_of_day_from_word(word: &str) -> Option<PartOfDay> {
    match word {
        "утром" | "утра" | "morning" => Some(PartOfDay::Morning),
        "днем" | "afternoon" => Some(PartOfDay::Afternoon),
        "вечером" | "evening" | "tonight" => Some(PartOfDay::Evening),
        "ночью" | "night" => Some(PartOfDay::Night),
        _ => None,
    }
}

fn month_from_name(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect();
    let month = match prefix.as_str() {
        "янв" | "jan" => 1,
        "фев" | "feb" => 2,
        "мар" | "mar" => 3,
        "апр" | "apr" => 4,
        "мая" | "май" | "may" => 5,
        "июн" | "jun" => 6,
        "июл" | "jul" => 7,
        "авг" | "aug" => 8,
        "сен" | "sep" => 9,
        "окт" | "oct" => 10,
        "ноя" | "nov" => 11,
        "дек" | "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    let prefix: String = name.chars().take(3).collect();
    let weekday = match prefix.as_str() {
        "пон" | "mon" => Weekday::Mon,
        "вто" | "tue" => Weekday::Tue,
        "сре" | "wed" => Weekday::Wed,
        "чет" | "thu" => Weekday::Thu,
        "пят" | "fri" => Weekday::Fri,
        "суб" | "sat" => Weekday::Sat,
        "вос" | "sun" => Weekday::Sun,
        _ => return None,
    };
    Some(weekday)
}

fn group_number(groups: &[Option<String>], index: usize) -> Option<u32> {
    groups.get(index)?.as_deref()?.parse().ok()
}

/// Removes the first match of `pattern` from `text`, returning its capture groups.
fn take_match(text: &mut String, pattern: &Regex) -> Option<Vec<Option<String>>> {
    let (groups, range) = {
        let captures = pattern.captures(text)?;
        let groups = captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_owned()))
            .collect::<Vec<_>>();
        (groups, captures.get(0)?.range())
    };

    text.replace_range(range, " ");
    Some(groups)
}

pub(super) fn date_for_anchor(anchor: &DayAnchor, today: NaiveDate) -> Option<NaiveDate> {
    match anchor {
        DayAnchor::DaysFromToday(days) => today.checked_add_signed(TimeDelta::try_days(*days)?),
        DayAnchor::Weekday(weekday) => {
            let days_ahead = (weekday.num_days_from_monday() as i64
                - today.weekday().num_days_from_monday() as i64)
                .rem_euclid(7);
            today.checked_add_signed(TimeDelta::try_days(days_ahead)?)
        }
        DayAnchor::Date { day, month, year } => {
            NaiveDate::from_ymd_opt(year.unwrap_or(today.year()), *month, *day)
        }
    }
}
