use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds (UTC). Every instant is normalized to this before comparison.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 86_400_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Like `new`, but rejects empty or inverted ranges instead of asserting.
    pub fn checked(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    /// The single overlap predicate. Adjacent spans do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Step between generated instances of a recurring blocked period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    /// One calendar month, anchored on the template's day of month.
    Monthly,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
        }
    }
}

impl FromStr for RecurrencePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(RecurrencePattern::Daily),
            "weekly" => Ok(RecurrencePattern::Weekly),
            "monthly" => Ok(RecurrencePattern::Monthly),
            other => Err(format!("unknown recurrence pattern: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub pattern: RecurrencePattern,
    /// Last instant at which a generated instance may start (inclusive).
    pub until: Ms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlockType {
    #[default]
    Personal,
    Vacation,
    Sick,
    Meeting,
    Holiday,
    Other,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Personal => "personal",
            BlockType::Vacation => "vacation",
            BlockType::Sick => "sick",
            BlockType::Meeting => "meeting",
            BlockType::Holiday => "holiday",
            BlockType::Other => "other",
        }
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "personal" => Ok(BlockType::Personal),
            "vacation" => Ok(BlockType::Vacation),
            "sick" => Ok(BlockType::Sick),
            "meeting" => Ok(BlockType::Meeting),
            "holiday" => Ok(BlockType::Holiday),
            "other" => Ok(BlockType::Other),
            other => Err(format!("unknown block type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BookingType {
    #[default]
    InPerson,
    Virtual,
    Both,
}

impl BookingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::InPerson => "in_person",
            BookingType::Virtual => "virtual",
            BookingType::Both => "both",
        }
    }
}

impl FromStr for BookingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in_person" | "in-person" => Ok(BookingType::InPerson),
            "virtual" => Ok(BookingType::Virtual),
            "both" => Ok(BookingType::Both),
            other => Err(format!("unknown booking type: {other}")),
        }
    }
}

impl fmt::Display for BookingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blocked period is either a recurring template or a concrete instance.
/// Only templates expand, and what they expand into is always an instance,
/// so recurrence can never chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodKind {
    Template(Recurrence),
    Instance { template_id: Option<Ulid> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPeriod {
    pub id: Ulid,
    pub broker_id: Ulid,
    pub span: Span,
    pub reason: Option<String>,
    pub block_type: BlockType,
    pub kind: PeriodKind,
    pub created_by: Option<String>,
    pub created_at: Ms,
}

impl BlockedPeriod {
    pub fn is_recurring(&self) -> bool {
        matches!(self.kind, PeriodKind::Template(_))
    }

    pub fn recurrence(&self) -> Option<Recurrence> {
        match self.kind {
            PeriodKind::Template(r) => Some(r),
            PeriodKind::Instance { .. } => None,
        }
    }

    pub fn template_id(&self) -> Option<Ulid> {
        match self.kind {
            PeriodKind::Template(_) => None,
            PeriodKind::Instance { template_id } => template_id,
        }
    }
}

/// Caller-supplied shape of one availability window, before it is resolved
/// against the broker's timezone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    pub break_between_slots_minutes: u32,
    pub max_bookings: u32,
    pub booking_type: BookingType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Ulid,
    pub broker_id: Ulid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// `start_time`..`end_time` on `date`, resolved in the broker's timezone.
    pub span: Span,
    pub slot_duration_minutes: u32,
    pub break_between_slots_minutes: u32,
    pub max_bookings: u32,
    pub current_bookings: u32,
    pub booking_type: BookingType,
    pub notes: Option<String>,
    pub is_available: bool,
}

impl AvailabilityWindow {
    pub fn remaining_capacity(&self) -> u32 {
        self.max_bookings.saturating_sub(self.current_bookings)
    }
}

/// A confirmed viewing that consumes window capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub broker_id: Ulid,
    pub window_id: Ulid,
    pub property_id: Option<Ulid>,
    pub span: Span,
    pub label: Option<String>,
    pub created_at: Ms,
}

/// Derived bookable unit. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub broker_id: Ulid,
    pub availability_window_id: Ulid,
    pub span: Span,
    /// `HH:MM` in the broker's timezone.
    pub time: String,
    pub duration_minutes: u32,
    pub max_bookings: u32,
    pub capacity_remaining: u32,
    pub booking_type: BookingType,
    pub notes: Option<String>,
}

impl Slot {
    pub fn is_available(&self) -> bool {
        self.capacity_remaining > 0
    }

    pub fn current_bookings(&self) -> u32 {
        self.max_bookings.saturating_sub(self.capacity_remaining)
    }
}

/// Every state change, as written to the WAL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    WindowsReplaced {
        broker_id: Ulid,
        date: NaiveDate,
        windows: Vec<AvailabilityWindow>,
    },
    WindowAvailabilitySet {
        id: Ulid,
        broker_id: Ulid,
        is_available: bool,
    },
    BlockedPeriodCreated {
        period: BlockedPeriod,
    },
    BlockedPeriodDeleted {
        id: Ulid,
        broker_id: Ulid,
    },
    CapacityReserved {
        window_id: Ulid,
        broker_id: Ulid,
    },
    CapacityReleased {
        window_id: Ulid,
        broker_id: Ulid,
    },
    BookingConfirmed {
        booking: Booking,
    },
    BookingCancelled {
        id: Ulid,
        broker_id: Ulid,
    },
    /// Compaction record: a ledger entry whose capacity is already counted
    /// in the window's `current_bookings`.
    BookingRestored {
        booking: Booking,
    },
}

impl Event {
    pub fn broker_id(&self) -> Ulid {
        match self {
            Event::WindowsReplaced { broker_id, .. }
            | Event::WindowAvailabilitySet { broker_id, .. }
            | Event::BlockedPeriodDeleted { broker_id, .. }
            | Event::CapacityReserved { broker_id, .. }
            | Event::CapacityReleased { broker_id, .. }
            | Event::BookingCancelled { broker_id, .. } => *broker_id,
            Event::BlockedPeriodCreated { period } => period.broker_id,
            Event::BookingConfirmed { booking } | Event::BookingRestored { booking } => {
                booking.broker_id
            }
        }
    }
}

/// Everything the engine knows about one broker, behind one lock.
#[derive(Debug, Clone)]
pub struct BrokerSchedule {
    pub broker_id: Ulid,
    /// Sorted by `(date, start_time)`.
    pub windows: Vec<AvailabilityWindow>,
    /// Sorted by `span.start`; pairwise non-overlapping.
    pub blocked: Vec<BlockedPeriod>,
    /// Sorted by `span.start`.
    pub bookings: Vec<Booking>,
}

impl BrokerSchedule {
    pub fn new(broker_id: Ulid) -> Self {
        Self {
            broker_id,
            windows: Vec::new(),
            blocked: Vec::new(),
            bookings: Vec::new(),
        }
    }

    pub fn window(&self, id: &Ulid) -> Option<&AvailabilityWindow> {
        self.windows.iter().find(|w| w.id == *id)
    }

    pub fn window_mut(&mut self, id: &Ulid) -> Option<&mut AvailabilityWindow> {
        self.windows.iter_mut().find(|w| w.id == *id)
    }

    pub fn windows_on(&self, date: NaiveDate) -> impl Iterator<Item = &AvailabilityWindow> {
        let lo = self.windows.partition_point(|w| w.date < date);
        let hi = self.windows.partition_point(|w| w.date <= date);
        self.windows[lo..hi].iter()
    }

    /// Drop every window on `date` and insert the replacements in order.
    pub fn replace_windows(&mut self, date: NaiveDate, mut windows: Vec<AvailabilityWindow>) {
        self.windows.retain(|w| w.date != date);
        let pos = self.windows.partition_point(|w| w.date < date);
        windows.sort_by_key(|w| w.start_time);
        self.windows.splice(pos..pos, windows);
    }

    /// Insert period maintaining sort order by span.start.
    pub fn insert_blocked(&mut self, period: BlockedPeriod) {
        let pos = self
            .blocked
            .partition_point(|p| p.span.start <= period.span.start);
        self.blocked.insert(pos, period);
    }

    pub fn remove_blocked(&mut self, id: Ulid) -> Option<BlockedPeriod> {
        let pos = self.blocked.iter().position(|p| p.id == id)?;
        Some(self.blocked.remove(pos))
    }

    /// Blocked periods whose span overlaps `query`.
    /// Uses binary search to skip periods starting at or after `query.end`.
    pub fn blocked_overlapping(&self, query: &Span) -> impl Iterator<Item = &BlockedPeriod> {
        let right_bound = self.blocked.partition_point(|p| p.span.start < query.end);
        self.blocked[..right_bound]
            .iter()
            .filter(move |p| p.span.overlaps(query))
    }

    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .partition_point(|b| b.span.start <= booking.span.start);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn bookings_overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self.bookings.partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.overlaps(query))
    }
}
