use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::time::resolve_local;

use super::conflict::check_text;
use super::{Engine, EngineError};

/// Validate one window and resolve it against the broker's timezone.
fn build_window(broker_id: Ulid, date: NaiveDate, spec: &WindowSpec, tz: Tz) -> Result<AvailabilityWindow, EngineError> {
    if spec.start_time >= spec.end_time {
        return Err(EngineError::Validation {
            field: "end_time",
            reason: format!("{} is not after {}", spec.end_time, spec.start_time),
        });
    }
    if spec.slot_duration_minutes == 0 {
        return Err(EngineError::Validation {
            field: "slot_duration",
            reason: "must be greater than zero".into(),
        });
    }
    if spec.slot_duration_minutes > MAX_SLOT_DURATION_MINUTES
        || spec.break_between_slots_minutes > MAX_SLOT_DURATION_MINUTES
    {
        return Err(EngineError::LimitExceeded("slot duration or break too long"));
    }
    if spec.max_bookings == 0 {
        return Err(EngineError::Validation {
            field: "max_bookings",
            reason: "must be at least 1".into(),
        });
    }
    if spec.max_bookings > MAX_BOOKINGS_PER_WINDOW {
        return Err(EngineError::LimitExceeded("max_bookings too large"));
    }
    check_text(&spec.notes, MAX_NOTES_LEN, "notes too long")?;

    let start = resolve_local(date, spec.start_time, tz)?;
    let end = resolve_local(date, spec.end_time, tz)?;
    let span = Span::checked(start, end).ok_or_else(|| EngineError::Validation {
        field: "end_time",
        reason: format!("{} is not after {} in {tz}", spec.end_time, spec.start_time),
    })?;

    Ok(AvailabilityWindow {
        id: Ulid::new(),
        broker_id,
        date,
        start_time: spec.start_time,
        end_time: spec.end_time,
        span,
        slot_duration_minutes: spec.slot_duration_minutes,
        break_between_slots_minutes: spec.break_between_slots_minutes,
        max_bookings: spec.max_bookings,
        current_bookings: 0,
        booking_type: spec.booking_type,
        notes: spec.notes.clone(),
        is_available: true,
    })
}

impl Engine {
    /// Replace every window the broker has on `date`.
    ///
    /// All windows are validated before anything is written; the first
    /// invalid one rejects the whole batch. A date whose current windows
    /// already carry bookings cannot be replaced.
    pub async fn upsert_windows_for_date(
        &self,
        broker_id: Ulid,
        date: NaiveDate,
        specs: Vec<WindowSpec>,
    ) -> Result<Vec<AvailabilityWindow>, EngineError> {
        if specs.len() > MAX_WINDOWS_PER_DATE {
            return Err(EngineError::LimitExceeded("too many windows for one date"));
        }
        let tz = self.broker_profile(broker_id).await?.tz()?;
        let windows = specs
            .iter()
            .map(|spec| build_window(broker_id, date, spec, tz))
            .collect::<Result<Vec<_>, _>>()?;

        let mut guard = self.lock_broker(broker_id).await;
        if let Some(busy) = guard
            .windows_on(date)
            .find(|w| w.current_bookings > 0 || guard.bookings.iter().any(|b| b.window_id == w.id))
        {
            return Err(EngineError::WindowHasBookings(busy.id));
        }

        let event = Event::WindowsReplaced {
            broker_id,
            date,
            windows,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        let stored: Vec<AvailabilityWindow> = guard.windows_on(date).cloned().collect();
        info!("broker {broker_id}: {} window(s) set for {date}", stored.len());
        Ok(stored)
    }

    /// Hide or reveal a window's slots without touching its bookings.
    pub async fn set_window_availability(
        &self,
        window_id: Ulid,
        is_available: bool,
    ) -> Result<AvailabilityWindow, EngineError> {
        let (broker_id, mut guard) = self.resolve_entity_write(&window_id).await?;
        if guard.window(&window_id).is_none() {
            return Err(EngineError::NotFound(window_id));
        }
        let event = Event::WindowAvailabilitySet {
            id: window_id,
            broker_id,
            is_available,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        guard
            .window(&window_id)
            .cloned()
            .ok_or(EngineError::NotFound(window_id))
    }

    /// Windows on `start_date..=end_date`, ascending by date then start time.
    pub async fn list_windows(
        &self,
        broker_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<AvailabilityWindow>, EngineError> {
        if end_date < start_date {
            return Err(EngineError::InvalidRange(format!(
                "end date {end_date} is before start date {start_date}"
            )));
        }
        if (end_date - start_date).num_days() >= MAX_QUERY_DAYS {
            return Err(EngineError::LimitExceeded("date range too wide"));
        }
        self.broker_profile(broker_id).await?;
        let Some(rs) = self.get_schedule(&broker_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        let lo = guard.windows.partition_point(|w| w.date < start_date);
        let hi = guard.windows.partition_point(|w| w.date <= end_date);
        Ok(guard.windows[lo..hi].to_vec())
    }
}
