use chrono_tz::Tz;

use crate::limits::*;
use crate::model::*;
use crate::time::truncate_to_hour;

use super::EngineError;

pub fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// Earliest start a new blocked period may have: the current local hour.
/// A start later in the current hour than `now` is fine, and so is one
/// earlier in that hour.
pub fn earliest_allowed_start(now: Ms, tz: Tz) -> Ms {
    truncate_to_hour(now, tz)
}

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_BLOCK_DURATION_MS {
        return Err(EngineError::LimitExceeded("blocked period too long"));
    }
    Ok(())
}

pub(crate) fn check_not_past(start: Ms, now: Ms, tz: Tz) -> Result<(), EngineError> {
    let floor = earliest_allowed_start(now, tz);
    if start < floor {
        return Err(EngineError::InvalidRange(format!(
            "start {} is before the current hour ({})",
            crate::time::format_local(start, tz),
            crate::time::format_local(floor, tz),
        )));
    }
    Ok(())
}

pub(crate) fn check_text(value: &Option<String>, max: usize, what: &'static str) -> Result<(), EngineError> {
    if let Some(v) = value
        && v.len() > max
    {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

/// Every blocked period of the broker that overlaps `span`, ascending by start.
pub fn find_conflicts(rs: &BrokerSchedule, span: &Span) -> Vec<BlockedPeriod> {
    rs.blocked_overlapping(span).cloned().collect()
}

pub(crate) fn check_no_conflict(rs: &BrokerSchedule, span: &Span) -> Result<(), EngineError> {
    let conflicts = find_conflicts(rs, span);
    if conflicts.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Conflict { conflicts })
    }
}
