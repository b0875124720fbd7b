//! Window capacity accounting.
//!
//! `current_bookings` is only ever changed here. A reservation is a check
//! and an increment performed while the broker's write lock is held, with the
//! WAL append in between, so two racing callers can never both see the last
//! free place.

use tracing::debug;
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

/// Would one more booking fit? The conditional half of a reservation.
pub fn check_reserve(window: &AvailabilityWindow) -> Result<(), EngineError> {
    if window.current_bookings < window.max_bookings {
        Ok(())
    } else {
        Err(EngineError::CapacityExceeded {
            window_id: window.id,
            max_bookings: window.max_bookings,
        })
    }
}

/// Increment, never past `max_bookings`.
pub fn increment(window: &mut AvailabilityWindow) {
    if window.current_bookings < window.max_bookings {
        window.current_bookings += 1;
    }
}

/// Decrement, floor-clamped at zero.
pub fn decrement(window: &mut AvailabilityWindow) {
    window.current_bookings = window.current_bookings.saturating_sub(1);
}

/// Clamp a slot's remaining capacity to what its window still has; window
/// level reservations made outside the booking ledger count against every slot.
pub fn annotate(slot: &mut Slot, window: &AvailabilityWindow) {
    slot.capacity_remaining = slot.capacity_remaining.min(window.remaining_capacity());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub window_id: Ulid,
    pub broker_id: Ulid,
    pub current_bookings: u32,
    pub max_bookings: u32,
}

impl Reservation {
    fn of(window: &AvailabilityWindow) -> Self {
        Self {
            window_id: window.id,
            broker_id: window.broker_id,
            current_bookings: window.current_bookings,
            max_bookings: window.max_bookings,
        }
    }
}

/// Places in `window_id` held by the booking ledger.
pub fn booked_places(rs: &BrokerSchedule, window_id: Ulid) -> u32 {
    rs.bookings.iter().filter(|b| b.window_id == window_id).count() as u32
}

impl Engine {
    /// Atomically take one place in a window. Fails with `CapacityExceeded`
    /// when the window is full; nothing is written in that case.
    pub async fn reserve(&self, window_id: Ulid) -> Result<Reservation, EngineError> {
        let (broker_id, mut guard) = self.resolve_entity_write(&window_id).await?;
        let window = guard.window(&window_id).ok_or(EngineError::NotFound(window_id))?;
        if let Err(e) = check_reserve(window) {
            debug!("reserve rejected on window {window_id}: full");
            metrics::counter!(crate::observability::RESERVATIONS_TOTAL, "outcome" => "capacity_exceeded")
                .increment(1);
            return Err(e);
        }

        let event = Event::CapacityReserved { window_id, broker_id };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(crate::observability::RESERVATIONS_TOTAL, "outcome" => "reserved").increment(1);

        let window = guard.window(&window_id).ok_or(EngineError::NotFound(window_id))?;
        Ok(Reservation::of(window))
    }

    /// Give back one place taken by `reserve`. Places held by confirmed
    /// bookings are only freed by cancelling them, so releasing a window with
    /// nothing beyond its bookings is a no-op, not an error.
    pub async fn release(&self, window_id: Ulid) -> Result<Reservation, EngineError> {
        let (broker_id, mut guard) = self.resolve_entity_write(&window_id).await?;
        let window = guard.window(&window_id).ok_or(EngineError::NotFound(window_id))?;
        if window.current_bookings > booked_places(&guard, window_id) {
            let event = Event::CapacityReleased { window_id, broker_id };
            self.persist_and_apply(&mut guard, &event).await?;
        }
        let window = guard.window(&window_id).ok_or(EngineError::NotFound(window_id))?;
        Ok(Reservation::of(window))
    }
}
