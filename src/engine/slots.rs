use chrono_tz::Tz;

use crate::model::*;
use crate::time::format_hhmm;

// ── Slot generation ──────────────────────────────────────────────

/// Cut a window into discrete bookable slots.
///
/// Starting at the window start, every `slot_duration` long candidate that
/// fits entirely inside the window is considered; candidates overlapping a
/// blocked period of the window's broker are dropped, the rest are emitted
/// with `max_bookings` minus the bookings overlapping them. The cursor then
/// advances by `slot_duration + break`. A trailing remainder shorter than a
/// slot is never emitted.
///
/// Pure: identical inputs always produce identical output.
pub fn generate(
    window: &AvailabilityWindow,
    tz: Tz,
    blocked: &[BlockedPeriod],
    bookings: &[Booking],
) -> Vec<Slot> {
    let duration = window.slot_duration_minutes as Ms * MINUTE_MS;
    if duration <= 0 {
        return Vec::new();
    }
    let step = duration + window.break_between_slots_minutes as Ms * MINUTE_MS;

    let mut slots = Vec::new();
    let mut cursor = window.span.start;
    while cursor + duration <= window.span.end {
        let candidate = Span::new(cursor, cursor + duration);
        cursor += step;

        let is_blocked = blocked
            .iter()
            .any(|p| p.broker_id == window.broker_id && p.span.overlaps(&candidate));
        if is_blocked {
            continue;
        }

        let taken = bookings
            .iter()
            .filter(|b| b.broker_id == window.broker_id && b.span.overlaps(&candidate))
            .count();
        let taken = u32::try_from(taken).unwrap_or(u32::MAX);

        slots.push(Slot {
            broker_id: window.broker_id,
            availability_window_id: window.id,
            span: candidate,
            time: format_hhmm(candidate.start, tz),
            duration_minutes: window.slot_duration_minutes,
            max_bookings: window.max_bookings,
            capacity_remaining: window.max_bookings.saturating_sub(taken),
            booking_type: window.booking_type,
            notes: window.notes.clone(),
        });
    }
    slots
}

/// The slot `generate` would emit starting exactly at `start`, if any.
pub fn slot_starting_at(
    window: &AvailabilityWindow,
    tz: Tz,
    blocked: &[BlockedPeriod],
    bookings: &[Booking],
    start: Ms,
) -> Option<Slot> {
    generate(window, tz, blocked, bookings)
        .into_iter()
        .find(|s| s.span.start == start)
}

/// True if `start` lines up with the window's slot grid and the slot fits.
pub fn is_on_grid(window: &AvailabilityWindow, start: Ms) -> bool {
    let duration = window.slot_duration_minutes as Ms * MINUTE_MS;
    let step = duration + window.break_between_slots_minutes as Ms * MINUTE_MS;
    if duration <= 0 || start < window.span.start || start + duration > window.span.end {
        return false;
    }
    (start - window.span.start) % step == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use proptest::prelude::*;
    use ulid::Ulid;

    const H: Ms = HOUR_MS;
    const M: Ms = MINUTE_MS;

    fn utc() -> Tz {
        chrono_tz::UTC
    }

    fn broker() -> Ulid {
        Ulid::from_string("01ARZ3NDEKTSV4RRFFQ69G5FAV").unwrap()
    }

    fn window(start: Ms, end: Ms, duration: u32, brk: u32, max: u32) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Ulid::from_string("01BX5ZZKBKACTAV9WEVGEMMVRZ").unwrap(),
            broker_id: broker(),
            date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            span: Span::new(start, end),
            slot_duration_minutes: duration,
            break_between_slots_minutes: brk,
            max_bookings: max,
            current_bookings: 0,
            booking_type: BookingType::InPerson,
            notes: Some("bring ID".into()),
            is_available: true,
        }
    }

    fn blocked(start: Ms, end: Ms) -> BlockedPeriod {
        BlockedPeriod {
            id: Ulid::new(),
            broker_id: broker(),
            span: Span::new(start, end),
            reason: None,
            block_type: BlockType::Personal,
            kind: PeriodKind::Instance { template_id: None },
            created_by: None,
            created_at: 0,
        }
    }

    fn booking(start: Ms, end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            broker_id: broker(),
            window_id: Ulid::nil(),
            property_id: None,
            span: Span::new(start, end),
            label: None,
            created_at: 0,
        }
    }

    #[test]
    fn break_pushes_last_slot_out() {
        // 09:00-12:00, 60 min slots, 15 min break -> 09:00 and 10:15 only.
        let w = window(9 * H, 12 * H, 60, 15, 1);
        let slots = generate(&w, utc(), &[], &[]);
        let times: Vec<_> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["09:00", "10:15"]);
        assert_eq!(slots[1].span, Span::new(10 * H + 15 * M, 11 * H + 15 * M));
    }

    #[test]
    fn blocked_period_drops_overlapping_slot() {
        let w = window(9 * H, 12 * H, 60, 15, 1);
        let b = blocked(10 * H, 10 * H + 30 * M);
        let slots = generate(&w, utc(), &[b], &[]);
        let times: Vec<_> = slots.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["09:00"]);
    }

    #[test]
    fn block_ending_at_slot_start_does_not_drop_it() {
        let w = window(9 * H, 11 * H, 60, 0, 1);
        let b = blocked(8 * H, 9 * H);
        assert_eq!(generate(&w, utc(), &[b], &[]).len(), 2);
    }

    #[test]
    fn other_brokers_blocks_are_ignored() {
        let w = window(9 * H, 11 * H, 60, 0, 1);
        let mut b = blocked(9 * H, 11 * H);
        b.broker_id = Ulid::new();
        assert_eq!(generate(&w, utc(), &[b], &[]).len(), 2);
    }

    #[test]
    fn no_break_is_back_to_back() {
        let w = window(9 * H, 11 * H, 30, 0, 1);
        let slots = generate(&w, utc(), &[], &[]);
        assert_eq!(slots.len(), 4);
        for pair in slots.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
    }

    #[test]
    fn partial_remainder_is_dropped() {
        // 100 minutes of window, 45 minute slots -> two slots, 10 minutes lost.
        let w = window(9 * H, 9 * H + 100 * M, 45, 0, 1);
        let slots = generate(&w, utc(), &[], &[]);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.span.duration_ms() == 45 * M));
    }

    #[test]
    fn window_shorter_than_slot_yields_nothing() {
        let w = window(9 * H, 9 * H + 20 * M, 30, 0, 1);
        assert!(generate(&w, utc(), &[], &[]).is_empty());
    }

    #[test]
    fn bookings_reduce_capacity() {
        let w = window(9 * H, 11 * H, 60, 0, 3);
        let bookings = vec![booking(9 * H, 10 * H), booking(9 * H + 30 * M, 10 * H + 30 * M)];
        let slots = generate(&w, utc(), &[], &bookings);
        assert_eq!(slots[0].capacity_remaining, 1);
        assert_eq!(slots[0].current_bookings(), 2);
        // Second booking spills into the 10:00 slot.
        assert_eq!(slots[1].capacity_remaining, 2);
        assert!(slots.iter().all(|s| s.is_available()));
    }

    #[test]
    fn full_slot_is_emitted_with_zero_capacity() {
        let w = window(9 * H, 10 * H, 60, 0, 1);
        let slots = generate(&w, utc(), &[], &[booking(9 * H, 10 * H)]);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].capacity_remaining, 0);
        assert!(!slots[0].is_available());
    }

    #[test]
    fn slot_carries_window_metadata() {
        let w = window(9 * H, 10 * H, 60, 0, 2);
        let s = &generate(&w, utc(), &[], &[])[0];
        assert_eq!(s.availability_window_id, w.id);
        assert_eq!(s.broker_id, w.broker_id);
        assert_eq!(s.duration_minutes, 60);
        assert_eq!(s.max_bookings, 2);
        assert_eq!(s.notes.as_deref(), Some("bring ID"));
    }

    #[test]
    fn slot_lookup_and_grid() {
        let w = window(9 * H, 12 * H, 60, 15, 1);
        assert!(slot_starting_at(&w, utc(), &[], &[], 10 * H + 15 * M).is_some());
        assert!(slot_starting_at(&w, utc(), &[], &[], 10 * H).is_none());
        assert!(is_on_grid(&w, 9 * H));
        assert!(is_on_grid(&w, 10 * H + 15 * M));
        assert!(!is_on_grid(&w, 11 * H + 30 * M)); // would overrun the window
        assert!(!is_on_grid(&w, 9 * H + M));
    }

    proptest! {
        #[test]
        fn slots_are_contained_and_unblocked(
            start_min in 0i64..600,
            len_min in 1i64..600,
            duration in 1u32..120,
            brk in 0u32..60,
            blocks in proptest::collection::vec((0i64..1200, 1i64..180), 0..6),
        ) {
            let w = window(start_min * M, (start_min + len_min) * M, duration, brk, 2);
            let periods: Vec<_> = blocks
                .iter()
                .map(|(s, l)| blocked(s * M, (s + l) * M))
                .collect();
            let slots = generate(&w, utc(), &periods, &[]);
            for s in &slots {
                prop_assert!(w.span.contains_span(&s.span));
                prop_assert_eq!(s.span.duration_ms(), duration as Ms * M);
                for p in &periods {
                    prop_assert!(!p.span.overlaps(&s.span));
                }
            }
            for pair in slots.windows(2) {
                prop_assert!(pair[0].span.end <= pair[1].span.start);
            }
        }

        #[test]
        fn generation_is_deterministic(
            len_min in 1i64..720,
            duration in 1u32..90,
            brk in 0u32..30,
            booked in proptest::collection::vec((0i64..720, 1i64..90), 0..5),
        ) {
            let w = window(0, len_min * M, duration, brk, 3);
            let bookings: Vec<_> = booked
                .iter()
                .map(|(s, l)| booking(s * M, (s + l) * M))
                .collect();
            let a = generate(&w, utc(), &[], &bookings);
            let b = generate(&w, utc(), &[], &bookings);
            prop_assert_eq!(a, b);
        }
    }
}
