use crate::model::{DAY_MS, Ms};

/// Timezone assumed for brokers that never declared one.
pub const DEFAULT_TIMEZONE: &str = "Africa/Cairo";

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 128;

pub const MAX_BROKER_NAME_LEN: usize = 256;
pub const MAX_REASON_LEN: usize = 1024;
pub const MAX_NOTES_LEN: usize = 1024;
pub const MAX_LABEL_LEN: usize = 1024;
pub const MAX_CREATED_BY_LEN: usize = 256;

/// Widest date range a listing or dashboard may cover.
pub const MAX_QUERY_DAYS: i64 = 90;

pub const MAX_WINDOWS_PER_DATE: usize = 48;
pub const MAX_SLOT_DURATION_MINUTES: u32 = 24 * 60;
pub const MAX_BOOKINGS_PER_WINDOW: u32 = 1000;

/// Upper bound on instances one recurring template may synthesize.
pub const MAX_RECURRENCE_INSTANCES: usize = 400;

pub const MAX_BLOCKED_PERIODS_PER_BROKER: usize = 10_000;
pub const MAX_BOOKINGS_PER_BROKER: usize = 100_000;

/// A single blocked period may not exceed one year.
pub const MAX_BLOCK_DURATION_MS: Ms = 366 * DAY_MS;

/// Sanity bounds on accepted instants: 2000-01-01 .. 2200-01-01.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;

pub const DEFAULT_DASHBOARD_HORIZON_DAYS: i64 = 30;
pub const DASHBOARD_LIST_LIMIT: usize = 10;
