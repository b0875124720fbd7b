use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::{process_socket, TlsAcceptor};
use tokio::net::TcpStream;
use tracing::debug;

use crate::auth::BrokerSlotAuthSource;
use crate::directory::{Assignment, BrokerProfile};
use crate::engine::{
    BlockedOutcome, BrokerSlots, DashboardSummary, EngineError, NewBlockedPeriod, NewBooking,
};
use crate::engine::capacity::Reservation;
use crate::model::*;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, Command, SqlError};
use crate::tenant::{Tenant, TenantManager};
use crate::time::format_local;

pub struct BrokerSlotHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<BrokerSlotQueryParser>,
}

impl BrokerSlotHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(BrokerSlotQueryParser),
        }
    }

    fn resolve_tenant<C: ClientInfo>(&self, client: &C) -> PgWireResult<Tenant> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Parse and run one statement, recording RED metrics.
    async fn run(&self, tenant: &Tenant, query: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = execute_command(tenant, cmd).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result.map_err(engine_err)
    }
}

async fn execute_command(tenant: &Tenant, cmd: Command) -> Result<Response, EngineError> {
    let engine = &tenant.engine;
    match cmd {
        Command::UpsertBroker { id, name, timezone, is_active } => {
            let mut profile = BrokerProfile::new(id, name);
            if let Some(tz) = timezone {
                profile.timezone = tz;
            }
            profile.is_active = is_active;
            tenant.directory.upsert_broker(profile)?;
            Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
        }
        Command::AssignBroker { property_id, broker_id, is_primary, is_active } => {
            tenant.directory.assign(Assignment { property_id, broker_id, is_primary, is_active })?;
            Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
        }
        Command::SetWindows { broker_id, date, windows } => {
            let stored = engine.upsert_windows_for_date(broker_id, date, windows).await?;
            windows_response(&stored)
        }
        Command::ClearWindows { broker_id, date } => {
            let removed = engine.list_windows(broker_id, date, date).await?.len();
            engine.upsert_windows_for_date(broker_id, date, Vec::new()).await?;
            Ok(Response::Execution(Tag::new("DELETE").with_rows(removed)))
        }
        Command::SetWindowStatus { window_id, is_available } => {
            engine.set_window_availability(window_id, is_available).await?;
            Ok(Response::Execution(Tag::new("INSERT").with_rows(1)))
        }
        Command::SelectWindows { broker_id, start_date, end_date } => {
            let windows = engine.list_windows(broker_id, start_date, end_date).await?;
            windows_response(&windows)
        }
        Command::InsertBlockedPeriod {
            broker_id,
            start,
            end,
            reason,
            block_type,
            recurrence,
            created_by,
        } => {
            let outcome = engine
                .create_blocked_period(NewBlockedPeriod {
                    broker_id,
                    start,
                    end,
                    reason,
                    block_type,
                    recurrence,
                    created_by,
                })
                .await?;
            outcome_response(&outcome)
        }
        Command::SelectBlockedPeriods { broker_id, start, end } => {
            let range = filter_range(start, end)?;
            let periods = engine.list_blocked_periods(broker_id, range).await?;
            blocked_response(&periods)
        }
        Command::DeleteBlockedPeriod { id } => {
            engine.delete_blocked_period(id).await?;
            Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
        }
        Command::SelectAvailableSlots { property_id, date, broker_id } => {
            let result = engine.available_slots(property_id, date, broker_id).await?;
            slots_response(&result)
        }
        Command::ReserveCapacity { window_id } => {
            let r = engine.reserve(window_id).await?;
            reservation_response(&r)
        }
        Command::ReleaseCapacity { window_id } => {
            let r = engine.release(window_id).await?;
            reservation_response(&r)
        }
        Command::InsertBooking { id, window_id, start, property_id, label } => {
            let booking = engine
                .book_slot(NewBooking { id, window_id, start, property_id, label })
                .await?;
            bookings_response(std::slice::from_ref(&booking))
        }
        Command::DeleteBooking { id } => {
            engine.cancel_booking(id).await?;
            Ok(Response::Execution(Tag::new("DELETE").with_rows(1)))
        }
        Command::SelectBookings { broker_id, start, end } => {
            let range = filter_range(start, end)?;
            let bookings = engine.list_bookings(broker_id, range).await?;
            bookings_response(&bookings)
        }
        Command::SelectDashboard { broker_id, horizon_days } => {
            let summary = engine.dashboard_summary(broker_id, horizon_days).await?;
            dashboard_response(&summary)
        }
    }
}

/// Optional `start`/`end` filters as one span; either side may be open.
fn filter_range(start: Option<Ms>, end: Option<Ms>) -> Result<Option<Span>, EngineError> {
    if start.is_none() && end.is_none() {
        return Ok(None);
    }
    let (s, e) = (start.unwrap_or(Ms::MIN), end.unwrap_or(Ms::MAX));
    Span::checked(s, e)
        .map(Some)
        .ok_or_else(|| EngineError::InvalidRange(format!("end {e} is not after start {s}")))
}

// ── Result sets ──────────────────────────────────────────────────

fn text(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn boolean(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::BOOL, FieldFormat::Text)
}

fn windows_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("broker_id"),
        text("date"),
        text("start_time"),
        text("end_time"),
        int("slot_duration"),
        int("break_minutes"),
        int("max_bookings"),
        int("current_bookings"),
        text("booking_type"),
        text("notes"),
        boolean("is_available"),
    ]
}

fn blocked_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("broker_id"),
        text("start"),
        text("end"),
        text("reason"),
        text("block_type"),
        boolean("is_recurring"),
        text("recurring_pattern"),
        text("recurring_until"),
        text("template_id"),
        text("created_by"),
    ]
}

fn outcome_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("start"),
        text("end"),
        boolean("is_recurring"),
        text("status"),
        text("error"),
    ]
}

fn slots_schema() -> Vec<FieldInfo> {
    vec![
        text("broker_id"),
        text("broker"),
        boolean("is_primary"),
        text("availability_id"),
        text("time"),
        text("start"),
        text("end"),
        int("duration_minutes"),
        boolean("available"),
        int("max_bookings"),
        int("current_bookings"),
        text("booking_type"),
        text("notes"),
    ]
}

fn reservation_schema() -> Vec<FieldInfo> {
    vec![
        text("window_id"),
        text("broker_id"),
        int("current_bookings"),
        int("max_bookings"),
    ]
}

fn bookings_schema() -> Vec<FieldInfo> {
    vec![
        text("id"),
        text("broker_id"),
        text("availability_id"),
        text("property_id"),
        text("start"),
        text("end"),
        text("label"),
    ]
}

fn dashboard_schema() -> Vec<FieldInfo> {
    vec![
        text("broker_id"),
        text("timezone"),
        int("horizon_days"),
        text("stats"),
        text("upcoming_viewings"),
        text("recent_viewings"),
        text("availability_summary"),
        text("blocked_times"),
        text("property_assignments"),
        text("degraded"),
    ]
}

fn iso(ms: Ms) -> String {
    format_local(ms, chrono_tz::UTC)
}

/// Encode `items` with `schema`; `row` writes one item's fields in order.
fn rows_response<T>(
    schema: Vec<FieldInfo>,
    items: &[T],
    row: impl Fn(&mut DataRowEncoder, &T) -> PgWireResult<()>,
) -> Result<Response, EngineError> {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            row(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn windows_response(windows: &[AvailabilityWindow]) -> Result<Response, EngineError> {
    rows_response(windows_schema(), windows, |enc, w| {
        enc.encode_field(&w.id.to_string())?;
        enc.encode_field(&w.broker_id.to_string())?;
        enc.encode_field(&w.date.to_string())?;
        enc.encode_field(&w.start_time.format("%H:%M").to_string())?;
        enc.encode_field(&w.end_time.format("%H:%M").to_string())?;
        enc.encode_field(&(w.slot_duration_minutes as i64))?;
        enc.encode_field(&(w.break_between_slots_minutes as i64))?;
        enc.encode_field(&(w.max_bookings as i64))?;
        enc.encode_field(&(w.current_bookings as i64))?;
        enc.encode_field(&w.booking_type.as_str().to_string())?;
        enc.encode_field(&w.notes)?;
        enc.encode_field(&w.is_available)
    })
}

fn blocked_response(periods: &[BlockedPeriod]) -> Result<Response, EngineError> {
    rows_response(blocked_schema(), periods, |enc, p| {
        let recurrence = p.recurrence();
        enc.encode_field(&p.id.to_string())?;
        enc.encode_field(&p.broker_id.to_string())?;
        enc.encode_field(&iso(p.span.start))?;
        enc.encode_field(&iso(p.span.end))?;
        enc.encode_field(&p.reason)?;
        enc.encode_field(&p.block_type.as_str().to_string())?;
        enc.encode_field(&p.is_recurring())?;
        enc.encode_field(&recurrence.map(|r| r.pattern.as_str().to_string()))?;
        enc.encode_field(&recurrence.map(|r| iso(r.until)))?;
        enc.encode_field(&p.template_id().map(|id| id.to_string()))?;
        enc.encode_field(&p.created_by)
    })
}

/// One row per stored period, then one per instance that failed.
fn outcome_response(outcome: &BlockedOutcome) -> Result<Response, EngineError> {
    struct Row {
        id: Option<String>,
        span: Span,
        is_recurring: bool,
        error: Option<String>,
    }
    let rows: Vec<Row> = outcome
        .created
        .iter()
        .map(|p| Row {
            id: Some(p.id.to_string()),
            span: p.span,
            is_recurring: p.is_recurring(),
            error: None,
        })
        .chain(outcome.failed.iter().map(|f| Row {
            id: None,
            span: f.span,
            is_recurring: false,
            error: Some(f.error.to_string()),
        }))
        .collect();
    rows_response(outcome_schema(), &rows, |enc, r| {
        enc.encode_field(&r.id)?;
        enc.encode_field(&iso(r.span.start))?;
        enc.encode_field(&iso(r.span.end))?;
        enc.encode_field(&r.is_recurring)?;
        let status = if r.error.is_none() { "created" } else { "failed" };
        enc.encode_field(&status.to_string())?;
        enc.encode_field(&r.error)
    })
}

fn slots_response(result: &[BrokerSlots]) -> Result<Response, EngineError> {
    let flat: Vec<(&BrokerSlots, &Slot)> = result
        .iter()
        .flat_map(|b| b.slots.iter().map(move |s| (b, s)))
        .collect();
    rows_response(slots_schema(), &flat, |enc, (b, s)| {
        enc.encode_field(&b.broker_id.to_string())?;
        enc.encode_field(&b.broker)?;
        enc.encode_field(&b.is_primary)?;
        enc.encode_field(&s.availability_window_id.to_string())?;
        enc.encode_field(&s.time)?;
        enc.encode_field(&iso(s.span.start))?;
        enc.encode_field(&iso(s.span.end))?;
        enc.encode_field(&(s.duration_minutes as i64))?;
        enc.encode_field(&s.is_available())?;
        enc.encode_field(&(s.max_bookings as i64))?;
        enc.encode_field(&(s.current_bookings() as i64))?;
        enc.encode_field(&s.booking_type.as_str().to_string())?;
        enc.encode_field(&s.notes)
    })
}

fn reservation_response(r: &Reservation) -> Result<Response, EngineError> {
    rows_response(reservation_schema(), std::slice::from_ref(r), |enc, r| {
        enc.encode_field(&r.window_id.to_string())?;
        enc.encode_field(&r.broker_id.to_string())?;
        enc.encode_field(&(r.current_bookings as i64))?;
        enc.encode_field(&(r.max_bookings as i64))
    })
}

fn bookings_response(bookings: &[Booking]) -> Result<Response, EngineError> {
    rows_response(bookings_schema(), bookings, |enc, b| {
        enc.encode_field(&b.id.to_string())?;
        enc.encode_field(&b.broker_id.to_string())?;
        enc.encode_field(&b.window_id.to_string())?;
        enc.encode_field(&b.property_id.map(|p| p.to_string()))?;
        enc.encode_field(&iso(b.span.start))?;
        enc.encode_field(&iso(b.span.end))?;
        enc.encode_field(&b.label)
    })
}

fn dashboard_response(summary: &DashboardSummary) -> Result<Response, EngineError> {
    fn json<T: serde::Serialize>(v: &T) -> Result<String, EngineError> {
        serde_json::to_string(v).map_err(|e| EngineError::Storage(format!("encode: {e}")))
    }
    let sections = [
        json(&summary.stats)?,
        json(&summary.upcoming_viewings)?,
        json(&summary.recent_viewings)?,
        json(&summary.availability_summary)?,
        json(&summary.blocked_times)?,
        json(&summary.property_assignments)?,
        json(&summary.degraded)?,
    ];
    rows_response(dashboard_schema(), std::slice::from_ref(summary), |enc, s| {
        enc.encode_field(&s.broker_id.to_string())?;
        enc.encode_field(&s.timezone)?;
        enc.encode_field(&s.horizon_days)?;
        for section in &sections {
            enc.encode_field(section)?;
        }
        Ok(())
    })
}

/// Result schema of a statement, from its verb and target table alone so
/// it works before parameters are bound.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let lower = sql.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|t| !t.is_empty())
        .collect();
    let verb = tokens.first().copied().unwrap_or_default();
    let table = tokens
        .windows(2)
        .find(|w| w[0] == "into" || w[0] == "from")
        .map(|w| w[1].trim_matches('"'))
        .unwrap_or_default();

    match (verb, table) {
        ("select" | "insert", "availability_windows") => windows_schema(),
        ("select", "blocked_periods") => blocked_schema(),
        ("insert", "blocked_periods") => outcome_schema(),
        ("select", "available_slots") => slots_schema(),
        ("insert" | "delete", "capacity_reservations") => reservation_schema(),
        ("select" | "insert", "bookings") => bookings_schema(),
        ("select", "dashboard_summary") => dashboard_schema(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl SimpleQueryHandler for BrokerSlotHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let tenant = self.resolve_tenant(client)?;
        Ok(vec![self.run(&tenant, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct BrokerSlotQueryParser;

#[async_trait]
impl QueryParser for BrokerSlotQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for BrokerSlotHandler {
    type Statement = String;
    type QueryParser = BrokerSlotQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let tenant = self.resolve_tenant(client)?;
        let sql = substitute_params(portal);
        self.run(&tenant, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, result_schema(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(&target.statement.statement)))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
            {
                max = max.max(n);
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
/// Highest index first so `$1` never clobbers the prefix of `$10`.
fn substitute_params(portal: &Portal<String>) -> String {
    let mut result = portal.statement.statement.to_string();
    for (i, param) in portal.parameters.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct BrokerSlotFactory {
    handler: Arc<BrokerSlotHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<BrokerSlotAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl BrokerSlotFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        let auth_source = BrokerSlotAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(BrokerSlotHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for BrokerSlotFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = BrokerSlotFactory::new(tenant_manager, password);
    process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

/// SQLSTATE for each engine error class.
pub fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::InvalidTimeFormat(_) => "22007",
        EngineError::InvalidRange(_) | EngineError::Validation { .. } => "22023",
        EngineError::Conflict { .. } => "23P01",
        EngineError::CapacityExceeded { .. } => "53400",
        EngineError::NotFound(_) => "P0002",
        EngineError::WindowHasBookings(_) => "55006",
        EngineError::SlotUnavailable { .. } => "55000",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::Storage(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    debug!("statement failed: {e}");
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    match e {
        SqlError::Value(e) => engine_err(e),
        other => PgWireError::UserError(Box::new(ErrorInfo::new(
            "ERROR".into(),
            "42601".into(),
            other.to_string(),
        ))),
    }
}
