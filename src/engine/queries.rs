use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use ulid::Ulid;

use crate::model::*;

use super::capacity::annotate;
use super::slots::generate;
use super::{Engine, EngineError};

/// One broker's slots for a property query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerSlots {
    pub broker_id: Ulid,
    pub broker: Option<String>,
    pub is_primary: bool,
    pub slots: Vec<Slot>,
}

/// Slots of every available window the broker has on `date`, ordered by
/// start, each clamped to its window's remaining capacity.
pub(super) fn day_slots(rs: &BrokerSchedule, date: NaiveDate, tz: Tz) -> Vec<Slot> {
    let mut slots = Vec::new();
    for window in rs.windows_on(date).filter(|w| w.is_available) {
        let blocked: Vec<BlockedPeriod> = rs.blocked_overlapping(&window.span).cloned().collect();
        let booked: Vec<Booking> = rs.bookings_overlapping(&window.span).cloned().collect();
        for mut slot in generate(window, tz, &blocked, &booked) {
            annotate(&mut slot, window);
            slots.push(slot);
        }
    }
    slots.sort_by_key(|s| s.span.start);
    slots
}

impl Engine {
    /// Bookable slots for a property on a local date, one entry per active
    /// assigned broker that has any, primary broker first.
    ///
    /// Each broker is read under its own read lock, so every broker's slots
    /// come from one consistent snapshot. Nothing is cached.
    pub async fn available_slots(
        &self,
        property_id: Ulid,
        date: NaiveDate,
        broker_id: Option<Ulid>,
    ) -> Result<Vec<BrokerSlots>, EngineError> {
        let assignments = self.directory.list_active_brokers(property_id).await?;

        let mut result = Vec::new();
        for assignment in assignments
            .into_iter()
            .filter(|a| broker_id.is_none_or(|b| b == a.broker_id))
        {
            let profile = match self.directory.get_broker(assignment.broker_id).await {
                Ok(p) => p,
                Err(EngineError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            if !profile.is_active {
                continue;
            }
            let tz = profile.tz()?;

            let Some(rs) = self.get_schedule(&assignment.broker_id) else {
                continue;
            };
            let slots = {
                let guard = rs.read().await;
                day_slots(&guard, date, tz)
            };
            if slots.is_empty() {
                continue;
            }
            result.push(BrokerSlots {
                broker_id: assignment.broker_id,
                broker: profile.name,
                is_primary: assignment.is_primary,
                slots,
            });
        }
        result.sort_by_key(|b| !b.is_primary);
        Ok(result)
    }

    /// Slots for each local date in `dates`, read from one snapshot.
    pub async fn slots_for_dates(
        &self,
        broker_id: Ulid,
        dates: &[NaiveDate],
    ) -> Result<Vec<(NaiveDate, Vec<Slot>)>, EngineError> {
        let tz = self.broker_profile(broker_id).await?.tz()?;
        let Some(rs) = self.get_schedule(&broker_id) else {
            return Ok(dates.iter().map(|d| (*d, Vec::new())).collect());
        };
        let guard = rs.read().await;
        Ok(dates.iter().map(|d| (*d, day_slots(&guard, *d, tz))).collect())
    }
}
