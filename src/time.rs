//! Time handling shared by every component.
//!
//! Instants are stored as UTC milliseconds ([`Ms`]). Anything a caller sends
//! is normalized here first: full datetimes must carry an explicit offset,
//! and local `(date, time)` pairs are resolved in the broker's timezone.
//! A local time that is skipped or repeated by a DST change is rejected
//! rather than guessed.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, LocalResult, Months, NaiveDate, NaiveDateTime,
    NaiveTime, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;

use crate::engine::EngineError;
use crate::model::{HOUR_MS, Ms, RecurrencePattern, Span};

pub fn parse_timezone(s: &str) -> Result<Tz, EngineError> {
    s.parse::<Tz>().map_err(|_| EngineError::Validation {
        field: "timezone",
        reason: format!("unknown IANA timezone '{s}'"),
    })
}

/// Parse an ISO-8601 datetime that carries an explicit UTC offset.
pub fn parse_instant(s: &str) -> Result<Ms, EngineError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M%:z"] {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(s, fmt) {
            return Ok(dt.timestamp_millis());
        }
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"));
    if naive.is_ok() {
        return Err(EngineError::InvalidTimeFormat(format!(
            "'{s}' has no UTC offset"
        )));
    }
    Err(EngineError::InvalidTimeFormat(format!(
        "'{s}' is not an ISO-8601 datetime"
    )))
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::InvalidTimeFormat(format!("date '{s}': {e}")))
}

/// Parse a `HH:MM` or `HH:MM:SS` wall-clock time.
pub fn parse_time(s: &str) -> Result<NaiveTime, EngineError> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| EngineError::InvalidTimeFormat(format!("time '{s}': {e}")))
}

/// Resolve a local date and time in `tz` to an instant.
pub fn resolve_local(date: NaiveDate, time: NaiveTime, tz: Tz) -> Result<Ms, EngineError> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Ok(dt.timestamp_millis()),
        LocalResult::Ambiguous(..) => Err(EngineError::InvalidTimeFormat(format!(
            "{date} {time} is ambiguous in {tz}"
        ))),
        LocalResult::None => Err(EngineError::InvalidTimeFormat(format!(
            "{date} {time} does not exist in {tz}"
        ))),
    }
}

/// First valid local instant of `date`. Some zones skip midnight on DST days,
/// in which case the day starts at the end of the gap.
pub fn start_of_local_day(date: NaiveDate, tz: Tz) -> Ms {
    let midnight = date.and_time(NaiveTime::MIN);
    for step in 0..=16 {
        let probe = midnight + chrono::Duration::minutes(15 * step);
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt.timestamp_millis();
        }
    }
    Utc.from_utc_datetime(&midnight).timestamp_millis()
}

/// The whole local calendar day `date` as a span.
pub fn local_day_span(date: NaiveDate, tz: Tz) -> Span {
    let next = date.succ_opt().unwrap_or(date);
    let start = start_of_local_day(date, tz);
    let end = start_of_local_day(next, tz).max(start + HOUR_MS);
    Span::new(start, end)
}

/// Local days `first..=last` as one span.
pub fn local_date_range_span(first: NaiveDate, last: NaiveDate, tz: Tz) -> Span {
    let start = start_of_local_day(first, tz);
    let end = local_day_span(last, tz).end.max(start + HOUR_MS);
    Span::new(start, end)
}

fn to_local(ms: Ms, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.with_timezone(&tz))
}

pub fn local_date(ms: Ms, tz: Tz) -> NaiveDate {
    to_local(ms, tz)
        .map(|dt| dt.date_naive())
        .unwrap_or(NaiveDate::MIN)
}

/// `HH:MM` wall-clock label for an instant.
pub fn format_hhmm(ms: Ms, tz: Tz) -> String {
    match to_local(ms, tz) {
        Some(dt) => format!("{:02}:{:02}", dt.hour(), dt.minute()),
        None => "--:--".to_string(),
    }
}

/// RFC 3339 rendering with the broker's local offset.
pub fn format_local(ms: Ms, tz: Tz) -> String {
    to_local(ms, tz)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// Truncate an instant to the start of its local hour. When the hour start
/// is repeated by a DST fall-back, the occurrence not after `ms` is chosen.
pub fn truncate_to_hour(ms: Ms, tz: Tz) -> Ms {
    let fallback = ms - ms.rem_euclid(HOUR_MS);
    let Some(local) = to_local(ms, tz) else {
        return fallback;
    };
    let Some(hour_start) = local
        .naive_local()
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
    else {
        return fallback;
    };
    match tz.from_local_datetime(&hour_start) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(a, b) => {
            let (a, b) = (a.timestamp_millis(), b.timestamp_millis());
            if a.max(b) <= ms { a.max(b) } else { a.min(b) }
        }
        LocalResult::None => fallback,
    }
}

/// The `k`-th recurrence of `base` under `pattern`, stepped in local calendar
/// terms so wall-clock time survives DST changes. Monthly steps are taken from
/// the base (not chained) so day-of-month clamping never drifts. A local time
/// falling into a DST gap moves forward to the first valid minute.
pub fn nth_occurrence(base: Ms, k: u32, pattern: RecurrencePattern, tz: Tz) -> Option<Ms> {
    let local = to_local(base, tz)?.naive_local();
    let date = local.date();
    let stepped = match pattern {
        RecurrencePattern::Daily => date.checked_add_days(Days::new(k as u64))?,
        RecurrencePattern::Weekly => date.checked_add_days(Days::new(7 * k as u64))?,
        RecurrencePattern::Monthly => date.checked_add_months(Months::new(k))?,
    };
    let candidate = stepped.and_time(local.time());
    for gap_minutes in (0..=180).step_by(15) {
        let shifted = candidate + chrono::Duration::minutes(gap_minutes);
        if let Some(dt) = tz.from_local_datetime(&shifted).earliest() {
            return Some(dt.timestamp_millis());
        }
    }
    None
}

/// Day of month of an instant in `tz`.
#[cfg(test)]
pub fn local_day_of_month(ms: Ms, tz: Tz) -> Option<u32> {
    to_local(ms, tz).map(|dt| dt.day())
}
