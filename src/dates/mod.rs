mod grammar;

use chrono::{
    DateTime, Days, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
    Utc,
};
use chrono_tz::Tz;

use grammar::{CalendarParts, Expression};

/// Turns a free-form time expression into an absolute instant.
pub trait DateResolver: Send + Sync {
    fn resolve(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

/// Russian and English relative time expressions, read in a fixed timezone.
///
/// Ambiguous expressions resolve to their nearest future occurrence: a time of
/// day that already passed means tomorrow, a date that already passed this year
/// means next year, and a weekday equal to today means next week once its time
/// has passed.
pub struct NaturalDateResolver {
    timezone: Tz,
}

impl NaturalDateResolver {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    fn resolve_calendar(&self, parts: CalendarParts, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let Some(anchor) = parts.day else {
            let time = parts.time?;
            return next_occurrence(&time, now);
        };

        let time = parts
            .time
            .unwrap_or_else(|| NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default());
        let date = grammar::date_for_anchor(&anchor, now.date())?;
        let candidate = date.and_time(time);

        match anchor {
            grammar::DayAnchor::Date { year: None, .. } if candidate <= now => {
                next_year(date).map(|date| date.and_time(time))
            }
            grammar::DayAnchor::Weekday(_) if candidate <= now => date
                .checked_add_days(Days::new(7))
                .map(|date| date.and_time(time)),
            _ => Some(candidate),
        }
    }

    fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.timezone.from_local_datetime(&local) {
            LocalResult::Single(datetime) => Some(datetime.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
            // Clock skipped forward over this time.
            LocalResult::None => self
                .timezone
                .from_local_datetime(&(local + TimeDelta::hours(1)))
                .earliest()
                .map(|datetime| datetime.with_timezone(&Utc)),
        }
    }
}

impl DateResolver for NaturalDateResolver {
    fn resolve(&self, text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_now = now.with_timezone(&self.timezone).naive_local();

        let resolved = match grammar::parse(text)? {
            Expression::Absolute(datetime) => Some(datetime.with_timezone(&Utc)),
            Expression::Local(local) => self.to_utc(local),
            Expression::Relative { delta, months } => {
                let shifted = if months == 0 {
                    now
                } else {
                    let local = local_now.checked_add_months(Months::new(months))?;
                    self.to_utc(local)?
                };
                shifted.checked_add_signed(delta)
            }
            Expression::Calendar(parts) => self
                .resolve_calendar(parts, local_now)
                .and_then(|local| self.to_utc(local)),
        };

        if resolved.is_none() {
            log::debug!("Could not resolve time expression. [text = {}]", text);
        }
        resolved
    }
}

/// The first moment strictly after `now` whose clock reads `fire_at`.
pub(crate) fn next_occurrence(fire_at: &NaiveTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let today = now.date().and_time(*fire_at);
    if today > now {
        Some(today)
    } else {
        now.date()
            .checked_add_days(Days::new(1))
            .map(|tomorrow| tomorrow.and_time(*fire_at))
    }
}

fn next_year(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(12))
}
