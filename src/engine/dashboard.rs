//! Read-only broker dashboard. Sections are fetched concurrently and a
//! section that fails is replaced by its empty default and named in
//! `degraded` instead of failing the whole summary.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::warn;
use ulid::Ulid;

use crate::directory::Assignment;
use crate::limits::*;
use crate::model::*;
use crate::time::{format_local, local_date, local_date_range_span};

use super::conflict::now_ms;
use super::{Engine, EngineError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub total_slots: u64,
    pub available_slots: u64,
    pub booked_slots: u64,
    pub days_with_availability: u64,
    pub upcoming_viewings: u64,
    pub blocked_periods: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub total_slots: u64,
    pub available_slots: u64,
    pub booked_slots: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewingView {
    pub id: Ulid,
    pub availability_id: Ulid,
    pub property_id: Option<Ulid>,
    pub start: String,
    pub end: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedView {
    pub id: Ulid,
    pub start: String,
    pub end: String,
    pub reason: Option<String>,
    pub block_type: &'static str,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub broker_id: Ulid,
    pub timezone: String,
    pub horizon_days: i64,
    pub stats: ProfileStats,
    pub upcoming_viewings: Vec<ViewingView>,
    pub recent_viewings: Vec<ViewingView>,
    pub availability_summary: Vec<DayAvailability>,
    pub blocked_times: Vec<BlockedView>,
    pub property_assignments: Vec<Assignment>,
    /// Sections that could not be fetched and hold defaults.
    pub degraded: Vec<&'static str>,
}

fn viewing(b: &Booking, tz: Tz) -> ViewingView {
    ViewingView {
        id: b.id,
        availability_id: b.window_id,
        property_id: b.property_id,
        start: format_local(b.span.start, tz),
        end: format_local(b.span.end, tz),
        label: b.label.clone(),
    }
}

fn blocked_view(p: &BlockedPeriod, tz: Tz) -> BlockedView {
    BlockedView {
        id: p.id,
        start: format_local(p.span.start, tz),
        end: format_local(p.span.end, tz),
        reason: p.reason.clone(),
        block_type: p.block_type.as_str(),
        is_recurring: p.is_recurring(),
    }
}

fn section<T: Default>(name: &'static str, result: Result<T, EngineError>, degraded: &mut Vec<&'static str>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!("dashboard section {name} degraded: {e}");
            degraded.push(name);
            T::default()
        }
    }
}

/// Per-day and overall counters over generated slots.
pub fn summarize(days: &[(NaiveDate, Vec<Slot>)]) -> (ProfileStats, Vec<DayAvailability>) {
    let mut stats = ProfileStats::default();
    let mut per_day: BTreeMap<NaiveDate, DayAvailability> = BTreeMap::new();
    for (date, slots) in days {
        if slots.is_empty() {
            continue;
        }
        let day = per_day.entry(*date).or_insert(DayAvailability {
            date: *date,
            total_slots: 0,
            available_slots: 0,
            booked_slots: 0,
        });
        for slot in slots {
            day.total_slots += 1;
            if slot.is_available() {
                day.available_slots += 1;
            }
            day.booked_slots += slot.current_bookings() as u64;
        }
        stats.total_slots += day.total_slots;
        stats.available_slots += day.available_slots;
        stats.booked_slots += day.booked_slots;
        if day.available_slots > 0 {
            stats.days_with_availability += 1;
        }
    }
    (stats, per_day.into_values().collect())
}

impl Engine {
    pub async fn dashboard_summary(
        &self,
        broker_id: Ulid,
        horizon_days: Option<i64>,
    ) -> Result<DashboardSummary, EngineError> {
        let horizon_days = horizon_days.unwrap_or(DEFAULT_DASHBOARD_HORIZON_DAYS);
        if !(1..=MAX_QUERY_DAYS).contains(&horizon_days) {
            return Err(EngineError::Validation {
                field: "horizon_days",
                reason: format!("must be between 1 and {MAX_QUERY_DAYS}"),
            });
        }
        let profile = self.broker_profile(broker_id).await?;
        let tz = profile.tz()?;

        let now = now_ms();
        let today = local_date(now, tz);
        let last = today
            .checked_add_days(Days::new(horizon_days as u64 - 1))
            .unwrap_or(today);
        let horizon = local_date_range_span(today, last, tz);
        let dates: Vec<NaiveDate> = today.iter_days().take_while(|d| *d <= last).collect();
        let upcoming_span = Span::new(now, horizon.end.max(now + 1));
        let recent_span = Span::new(now - horizon_days * DAY_MS, now);

        let (upcoming, recent, days, blocked, properties) = tokio::join!(
            self.list_bookings(broker_id, Some(upcoming_span)),
            self.list_bookings(broker_id, Some(recent_span)),
            self.slots_for_dates(broker_id, &dates),
            self.list_blocked_periods(broker_id, Some(horizon)),
            self.directory.list_broker_properties(broker_id),
        );

        let mut degraded = Vec::new();
        let upcoming = section("upcomingViewings", upcoming, &mut degraded);
        let recent = section("recentViewings", recent, &mut degraded);
        let days = section("availabilitySummary", days, &mut degraded);
        let blocked = section("blockedTimes", blocked, &mut degraded);
        let properties = section("propertyAssignments", properties, &mut degraded);

        let (mut stats, availability_summary) = summarize(&days);
        stats.upcoming_viewings = upcoming.len() as u64;
        stats.blocked_periods = blocked.len() as u64;

        let upcoming_viewings = upcoming
            .iter()
            .take(DASHBOARD_LIST_LIMIT)
            .map(|b| viewing(b, tz))
            .collect();
        let recent_viewings = recent
            .iter()
            .rev()
            .filter(|b| b.span.end <= now)
            .take(DASHBOARD_LIST_LIMIT)
            .map(|b| viewing(b, tz))
            .collect();
        let blocked_times = blocked.iter().map(|p| blocked_view(p, tz)).collect();

        Ok(DashboardSummary {
            broker_id,
            timezone: profile.timezone,
            horizon_days,
            stats,
            upcoming_viewings,
            recent_viewings,
            availability_summary,
            blocked_times,
            property_assignments: properties,
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(max: u32, remaining: u32) -> Slot {
        Slot {
            broker_id: Ulid::nil(),
            availability_window_id: Ulid::nil(),
            span: Span::new(0, HOUR_MS),
            time: "09:00".into(),
            duration_minutes: 60,
            max_bookings: max,
            capacity_remaining: remaining,
            booking_type: BookingType::InPerson,
            notes: None,
        }
    }

    #[test]
    fn summary_counts() {
        let d1 = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2030, 1, 3).unwrap();
        let days = vec![
            (d1, vec![slot(2, 2), slot(2, 1), slot(1, 0)]),
            (d2, vec![slot(1, 0)]),
            (d3, vec![]),
        ];
        let (stats, per_day) = summarize(&days);
        assert_eq!(stats.total_slots, 4);
        assert_eq!(stats.available_slots, 2);
        assert_eq!(stats.booked_slots, 3);
        assert_eq!(stats.days_with_availability, 1);
        assert_eq!(per_day.len(), 2);
        assert_eq!(per_day[1].available_slots, 0);
    }

    #[test]
    fn summary_serializes_camel_case() {
        let json = serde_json::to_value(ProfileStats::default()).unwrap();
        assert!(json.get("daysWithAvailability").is_some());
        assert!(json.get("bookedSlots").is_some());
    }
}
