use dashmap::mapref::entry::Entry;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::capacity::{annotate, check_reserve};
use super::conflict::{check_text, now_ms};
use super::slots::{is_on_grid, slot_starting_at};
use super::{Engine, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub id: Ulid,
    pub window_id: Ulid,
    /// Must be the start of one of the window's generated slots.
    pub start: Ms,
    pub property_id: Option<Ulid>,
    pub label: Option<String>,
}

impl Engine {
    /// Book one generated slot. The slot is re-derived under the broker's
    /// write lock, so a period blocked or a place taken a moment ago is seen.
    pub async fn book_slot(&self, req: NewBooking) -> Result<Booking, EngineError> {
        check_text(&req.label, MAX_LABEL_LEN, "label too long")?;
        let broker_id = self
            .get_broker_for_entity(&req.window_id)
            .ok_or(EngineError::NotFound(req.window_id))?;
        let tz = self.broker_profile(broker_id).await?.tz()?;

        let mut guard = self.lock_broker(broker_id).await;
        if self.entity_to_broker.contains_key(&req.id) {
            return Err(EngineError::AlreadyExists(req.id));
        }
        if guard.bookings.len() >= MAX_BOOKINGS_PER_BROKER {
            return Err(EngineError::LimitExceeded("too many bookings for broker"));
        }

        let span = {
            let window = guard
                .window(&req.window_id)
                .ok_or(EngineError::NotFound(req.window_id))?;
            let duration = (window.slot_duration_minutes as Ms * MINUTE_MS).max(1);
            let requested = Span::new(req.start, req.start + duration);
            if !window.is_available {
                return Err(EngineError::SlotUnavailable {
                    span: requested,
                    reason: "window is marked unavailable",
                });
            }
            if !is_on_grid(window, req.start) {
                return Err(EngineError::SlotUnavailable {
                    span: requested,
                    reason: "not on the window's slot grid",
                });
            }
            check_reserve(window)?;

            let blocked: Vec<BlockedPeriod> = guard.blocked_overlapping(&window.span).cloned().collect();
            let booked: Vec<Booking> = guard.bookings_overlapping(&window.span).cloned().collect();
            let Some(mut slot) = slot_starting_at(window, tz, &blocked, &booked, req.start) else {
                return Err(EngineError::SlotUnavailable {
                    span: requested,
                    reason: "overlaps a blocked period",
                });
            };
            annotate(&mut slot, window);
            if !slot.is_available() {
                debug!("booking {} rejected: slot {} full", req.id, slot.time);
                return Err(EngineError::CapacityExceeded {
                    window_id: window.id,
                    max_bookings: window.max_bookings,
                });
            }
            slot.span
        };

        let booking = Booking {
            id: req.id,
            broker_id,
            window_id: req.window_id,
            property_id: req.property_id,
            span,
            label: req.label,
            created_at: now_ms(),
        };
        // Claim the id across all brokers before the append.
        match self.entity_to_broker.entry(booking.id) {
            Entry::Occupied(_) => return Err(EngineError::AlreadyExists(booking.id)),
            Entry::Vacant(v) => {
                v.insert(broker_id);
            }
        }
        let event = Event::BookingConfirmed {
            booking: booking.clone(),
        };
        if let Err(e) = self.persist_and_apply(&mut guard, &event).await {
            self.entity_to_broker.remove(&booking.id);
            return Err(e);
        }
        info!("booking {} confirmed on window {} for broker {broker_id}", booking.id, booking.window_id);
        Ok(booking)
    }

    /// Remove a booking and give its place back to the window.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        let (broker_id, mut guard) = self.resolve_entity_write(&id).await?;
        let booking = guard
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        let event = Event::BookingCancelled { id, broker_id };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("booking {id} cancelled for broker {broker_id}");
        Ok(booking)
    }

    /// Bookings of a broker overlapping `range` (all of them if `None`), ascending by start.
    pub async fn list_bookings(&self, broker_id: Ulid, range: Option<Span>) -> Result<Vec<Booking>, EngineError> {
        self.broker_profile(broker_id).await?;
        let Some(rs) = self.get_schedule(&broker_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        Ok(match range {
            Some(r) => guard.bookings_overlapping(&r).cloned().collect(),
            None => guard.bookings.clone(),
        })
    }
}
