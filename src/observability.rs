use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "brokerslot_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "brokerslot_query_duration_seconds";

/// Counter: capacity reservations. Labels: outcome (reserved, capacity_exceeded).
pub const RESERVATIONS_TOTAL: &str = "brokerslot_reservations_total";

/// Counter: blocked-period creations rejected for overlapping existing periods.
pub const BLOCKED_CONFLICTS_TOTAL: &str = "brokerslot_blocked_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "brokerslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "brokerslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "brokerslot_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "brokerslot_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "brokerslot_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "brokerslot_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::UpsertBroker { .. } => "upsert_broker",
        Command::AssignBroker { .. } => "assign_broker",
        Command::SetWindows { .. } => "set_windows",
        Command::ClearWindows { .. } => "clear_windows",
        Command::SetWindowStatus { .. } => "set_window_status",
        Command::SelectWindows { .. } => "select_windows",
        Command::InsertBlockedPeriod { .. } => "insert_blocked_period",
        Command::SelectBlockedPeriods { .. } => "select_blocked_periods",
        Command::DeleteBlockedPeriod { .. } => "delete_blocked_period",
        Command::SelectAvailableSlots { .. } => "select_available_slots",
        Command::ReserveCapacity { .. } => "reserve_capacity",
        Command::ReleaseCapacity { .. } => "release_capacity",
        Command::InsertBooking { .. } => "insert_booking",
        Command::DeleteBooking { .. } => "delete_booking",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectDashboard { .. } => "select_dashboard",
    }
}
