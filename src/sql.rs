use chrono::{NaiveDate, NaiveTime};
use sqlparser::ast::{
    self, BinaryOperator, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value,
    ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::*;
use crate::time::{parse_date, parse_instant, parse_time};

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    UpsertBroker {
        id: Ulid,
        name: Option<String>,
        timezone: Option<String>,
        is_active: bool,
    },
    AssignBroker {
        property_id: Ulid,
        broker_id: Ulid,
        is_primary: bool,
        is_active: bool,
    },
    SetWindows {
        broker_id: Ulid,
        date: NaiveDate,
        windows: Vec<WindowSpec>,
    },
    ClearWindows {
        broker_id: Ulid,
        date: NaiveDate,
    },
    SetWindowStatus {
        window_id: Ulid,
        is_available: bool,
    },
    SelectWindows {
        broker_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    InsertBlockedPeriod {
        broker_id: Ulid,
        start: Ms,
        end: Ms,
        reason: Option<String>,
        block_type: BlockType,
        recurrence: Option<Recurrence>,
        created_by: Option<String>,
    },
    SelectBlockedPeriods {
        broker_id: Ulid,
        start: Option<Ms>,
        end: Option<Ms>,
    },
    DeleteBlockedPeriod {
        id: Ulid,
    },
    SelectAvailableSlots {
        property_id: Ulid,
        date: NaiveDate,
        broker_id: Option<Ulid>,
    },
    ReserveCapacity {
        window_id: Ulid,
    },
    ReleaseCapacity {
        window_id: Ulid,
    },
    InsertBooking {
        id: Ulid,
        window_id: Ulid,
        start: Ms,
        property_id: Option<Ulid>,
        label: Option<String>,
    },
    DeleteBooking {
        id: Ulid,
    },
    SelectBookings {
        broker_id: Ulid,
        start: Option<Ms>,
        end: Option<Ms>,
    },
    SelectDashboard {
        broker_id: Ulid,
        horizon_days: Option<i64>,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let rows = extract_insert_rows(insert)?;
    if table != "availability_windows" && rows.len() > 1 {
        return Err(SqlError::Unsupported(format!("multi-row INSERT into {table}")));
    }
    let values = &rows[0];

    match table.as_str() {
        "brokers" => {
            require(values, "brokers", 1)?;
            Ok(Command::UpsertBroker {
                id: parse_ulid(&values[0])?,
                name: optional(values, 1, parse_opt_text)?.flatten(),
                timezone: optional(values, 2, parse_opt_text)?.flatten(),
                is_active: optional(values, 3, parse_bool)?.unwrap_or(true),
            })
        }
        "property_brokers" => {
            require(values, "property_brokers", 2)?;
            Ok(Command::AssignBroker {
                property_id: parse_ulid(&values[0])?,
                broker_id: parse_ulid(&values[1])?,
                is_primary: optional(values, 2, parse_bool)?.unwrap_or(false),
                is_active: optional(values, 3, parse_bool)?.unwrap_or(true),
            })
        }
        "availability_windows" => parse_windows(&rows),
        "window_status" => {
            require(values, "window_status", 2)?;
            Ok(Command::SetWindowStatus {
                window_id: parse_ulid(&values[0])?,
                is_available: parse_bool(&values[1])?,
            })
        }
        "blocked_periods" => {
            require(values, "blocked_periods", 3)?;
            let pattern = optional(values, 5, parse_opt_text)?.flatten();
            let until = optional(values, 6, parse_opt_instant)?.flatten();
            let recurrence = match (pattern, until) {
                (None, None) => None,
                (Some(p), Some(until)) => Some(Recurrence {
                    pattern: p.parse().map_err(SqlError::Parse)?,
                    until,
                }),
                (Some(_), None) => return Err(SqlError::Parse("recurring_pattern requires recurring_until".into())),
                (None, Some(_)) => return Err(SqlError::Parse("recurring_until requires recurring_pattern".into())),
            };
            let block_type = match optional(values, 4, parse_opt_text)?.flatten() {
                Some(s) => s.parse().map_err(SqlError::Parse)?,
                None => BlockType::default(),
            };
            Ok(Command::InsertBlockedPeriod {
                broker_id: parse_ulid(&values[0])?,
                start: parse_instant_expr(&values[1])?,
                end: parse_instant_expr(&values[2])?,
                reason: optional(values, 3, parse_opt_text)?.flatten(),
                block_type,
                recurrence,
                created_by: optional(values, 7, parse_opt_text)?.flatten(),
            })
        }
        "capacity_reservations" => {
            require(values, "capacity_reservations", 1)?;
            Ok(Command::ReserveCapacity {
                window_id: parse_ulid(&values[0])?,
            })
        }
        "bookings" => {
            require(values, "bookings", 3)?;
            Ok(Command::InsertBooking {
                id: parse_ulid(&values[0])?,
                window_id: parse_ulid(&values[1])?,
                start: parse_instant_expr(&values[2])?,
                property_id: optional(values, 3, parse_opt_ulid)?.flatten(),
                label: optional(values, 4, parse_opt_text)?.flatten(),
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Every row must target the same broker and date; the rows become that
/// date's complete set of windows.
fn parse_windows(rows: &[Vec<Expr>]) -> Result<Command, SqlError> {
    let mut target: Option<(Ulid, NaiveDate)> = None;
    let mut windows = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        require(row, "availability_windows", 7)?;
        let key = (parse_ulid(&row[0])?, parse_date_expr(&row[1])?);
        match target {
            None => target = Some(key),
            Some(t) if t != key => {
                return Err(SqlError::Parse(format!("row {i}: every row must share broker_id and date")));
            }
            Some(_) => {}
        }
        let booking_type = match optional(row, 7, parse_opt_text)?.flatten() {
            Some(s) => s.parse().map_err(|e: String| SqlError::Parse(format!("row {i}: {e}")))?,
            None => BookingType::default(),
        };
        windows.push(WindowSpec {
            start_time: parse_time_expr(&row[2])?,
            end_time: parse_time_expr(&row[3])?,
            slot_duration_minutes: parse_u32(&row[4])?,
            break_between_slots_minutes: parse_u32(&row[5])?,
            max_bookings: parse_u32(&row[6])?,
            booking_type,
            notes: optional(row, 8, parse_opt_text)?.flatten(),
        });
    }
    let (broker_id, date) = target.ok_or_else(|| SqlError::Parse("empty VALUES".into()))?;
    Ok(Command::SetWindows { broker_id, date, windows })
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = collect_filters(delete.selection.as_ref())?;

    match table.as_str() {
        "availability_windows" => Ok(Command::ClearWindows {
            broker_id: parse_ulid(filters.require("broker_id", Op::Eq)?)?,
            date: parse_date_expr(filters.require("date", Op::Eq)?)?,
        }),
        "blocked_periods" => Ok(Command::DeleteBlockedPeriod {
            id: parse_ulid(filters.require("id", Op::Eq)?)?,
        }),
        "capacity_reservations" => Ok(Command::ReleaseCapacity {
            window_id: parse_ulid(filters.require("window_id", Op::Eq)?)?,
        }),
        "bookings" => Ok(Command::DeleteBooking {
            id: parse_ulid(filters.require("id", Op::Eq)?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;
    let filters = collect_filters(select.selection.as_ref())?;

    match table.as_str() {
        "availability_windows" => {
            let broker_id = parse_ulid(filters.require("broker_id", Op::Eq)?)?;
            // `date = X` is shorthand for a one-day range.
            if let Some(day) = filters.get("date", Op::Eq) {
                let date = parse_date_expr(day)?;
                return Ok(Command::SelectWindows { broker_id, start_date: date, end_date: date });
            }
            Ok(Command::SelectWindows {
                broker_id,
                start_date: parse_date_expr(filters.require("date", Op::GtEq)?)?,
                end_date: parse_date_expr(filters.require("date", Op::LtEq)?)?,
            })
        }
        "blocked_periods" => Ok(Command::SelectBlockedPeriods {
            broker_id: parse_ulid(filters.require("broker_id", Op::Eq)?)?,
            start: filters.get("start", Op::GtEq).map(parse_instant_expr).transpose()?,
            end: filters.get("end", Op::LtEq).map(parse_instant_expr).transpose()?,
        }),
        "available_slots" => Ok(Command::SelectAvailableSlots {
            property_id: parse_ulid(filters.require("property_id", Op::Eq)?)?,
            date: parse_date_expr(filters.require("date", Op::Eq)?)?,
            broker_id: filters.get("broker_id", Op::Eq).map(parse_ulid).transpose()?,
        }),
        "bookings" => Ok(Command::SelectBookings {
            broker_id: parse_ulid(filters.require("broker_id", Op::Eq)?)?,
            start: filters.get("start", Op::GtEq).map(parse_instant_expr).transpose()?,
            end: filters.get("end", Op::LtEq).map(parse_instant_expr).transpose()?,
        }),
        "dashboard_summary" => Ok(Command::SelectDashboard {
            broker_id: parse_ulid(filters.require("broker_id", Op::Eq)?)?,
            horizon_days: filters.get("horizon_days", Op::Eq).map(parse_i64).transpose()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

// ── WHERE clauses ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    GtEq,
    LtEq,
}

/// Conjunction of `column <op> literal` terms.
#[derive(Debug, Default)]
struct Filters(Vec<(String, Op, Expr)>);

impl Filters {
    fn get(&self, column: &str, op: Op) -> Option<&Expr> {
        self.0
            .iter()
            .find(|(c, o, _)| c == column && *o == op)
            .map(|(_, _, e)| e)
    }

    fn require(&self, column: &'static str, op: Op) -> Result<&Expr, SqlError> {
        self.get(column, op).ok_or(SqlError::MissingFilter(column))
    }
}

fn collect_filters(selection: Option<&Expr>) -> Result<Filters, SqlError> {
    let mut filters = Filters::default();
    if let Some(expr) = selection {
        push_filters(expr, &mut filters)?;
    }
    Ok(filters)
}

fn push_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => push_filters(inner, filters),
        Expr::BinaryOp { left, op, right } => {
            let op = match op {
                BinaryOperator::And => {
                    push_filters(left, filters)?;
                    return push_filters(right, filters);
                }
                BinaryOperator::Eq => Op::Eq,
                BinaryOperator::GtEq => Op::GtEq,
                BinaryOperator::LtEq => Op::LtEq,
                other => return Err(SqlError::Unsupported(format!("operator {other} in WHERE"))),
            };
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("expected column on the left of {expr}")))?;
            filters.0.push((column, op, right.as_ref().clone()));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn require(values: &[Expr], table: &'static str, n: usize) -> Result<(), SqlError> {
    if values.len() < n {
        return Err(SqlError::WrongArity(table, n, values.len()));
    }
    Ok(())
}

/// Parse a trailing positional column if it was supplied.
fn optional<T>(
    values: &[Expr],
    idx: usize,
    parse: impl Fn(&Expr) -> Result<T, SqlError>,
) -> Result<Option<T>, SqlError> {
    values.get(idx).map(parse).transpose()
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_opt_text(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) | Some(Value::DoubleQuotedString(s)) => Ok(Some(s.clone())),
        Some(Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_text(expr: &Expr) -> Result<String, SqlError> {
    parse_opt_text(expr)?.ok_or_else(|| SqlError::Parse("unexpected NULL".into()))
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_text(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID '{s}': {e}")))
}

fn parse_opt_ulid(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    match parse_opt_text(expr)? {
        None => Ok(None),
        Some(s) => Ulid::from_string(&s)
            .map(Some)
            .map_err(|e| SqlError::Parse(format!("bad ULID '{s}': {e}"))),
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        return Ok(-parse_i64(expr)?);
    }
    let s = parse_text(expr)?;
    s.trim()
        .parse()
        .map_err(|e| SqlError::Parse(format!("bad integer '{s}': {e}")))
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_bool(expr: &Expr) -> Result<bool, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Boolean(b) => Ok(*b),
            Value::SingleQuotedString(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(SqlError::Parse(format!("bad bool: {s}"))),
            },
            Value::Number(n, _) => Ok(n != "0"),
            _ => Err(SqlError::Parse(format!("expected bool, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_instant_expr(expr: &Expr) -> Result<Ms, SqlError> {
    Ok(parse_instant(&parse_text(expr)?)?)
}

fn parse_opt_instant(expr: &Expr) -> Result<Option<Ms>, SqlError> {
    match parse_opt_text(expr)? {
        None => Ok(None),
        Some(s) => Ok(Some(parse_instant(&s)?)),
    }
}

fn parse_date_expr(expr: &Expr) -> Result<NaiveDate, SqlError> {
    Ok(parse_date(&parse_text(expr)?)?)
}

fn parse_time_expr(expr: &Expr) -> Result<NaiveTime, SqlError> {
    Ok(parse_time(&parse_text(expr)?)?)
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("{0}: expected at least {1} values, got {2}")]
    WrongArity(&'static str, usize, usize),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    /// A literal that parsed as SQL but is not a valid date, time or instant.
    #[error(transparent)]
    Value(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROKER: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const PROPERTY: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    #[test]
    fn parse_insert_broker_defaults() {
        let sql = format!("INSERT INTO brokers (id) VALUES ('{BROKER}')");
        match parse_sql(&sql).unwrap() {
            Command::UpsertBroker { id, name, timezone, is_active } => {
                assert_eq!(id.to_string(), BROKER);
                assert_eq!(name, None);
                assert_eq!(timezone, None);
                assert!(is_active);
            }
            cmd => panic!("expected UpsertBroker, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_broker_full() {
        let sql = format!(
            "INSERT INTO brokers (id, name, timezone, is_active) VALUES ('{BROKER}', 'Nour', 'Asia/Dubai', false)"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpsertBroker { name, timezone, is_active, .. } => {
                assert_eq!(name.as_deref(), Some("Nour"));
                assert_eq!(timezone.as_deref(), Some("Asia/Dubai"));
                assert!(!is_active);
            }
            cmd => panic!("expected UpsertBroker, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_assignment() {
        let sql = format!(
            "INSERT INTO property_brokers (property_id, broker_id, is_primary) VALUES ('{PROPERTY}', '{BROKER}', true)"
        );
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::AssignBroker { is_primary: true, is_active: true, .. }
        ));
    }

    #[test]
    fn parse_multi_row_windows() {
        let sql = format!(
            "INSERT INTO availability_windows (broker_id, date, start_time, end_time, slot_duration, break_minutes, max_bookings, booking_type) VALUES \
             ('{BROKER}', '2030-01-15', '09:00', '12:00', 60, 15, 1, 'virtual'), \
             ('{BROKER}', '2030-01-15', '14:00', '16:30', 30, 0, 2, NULL)"
        );
        match parse_sql(&sql).unwrap() {
            Command::SetWindows { date, windows, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2030, 1, 15).unwrap());
                assert_eq!(windows.len(), 2);
                assert_eq!(windows[0].booking_type, BookingType::Virtual);
                assert_eq!(windows[0].break_between_slots_minutes, 15);
                assert_eq!(windows[1].booking_type, BookingType::InPerson);
                assert_eq!(windows[1].end_time, NaiveTime::from_hms_opt(16, 30, 0).unwrap());
                assert_eq!(windows[1].max_bookings, 2);
            }
            cmd => panic!("expected SetWindows, got {cmd:?}"),
        }
    }

    #[test]
    fn windows_rows_must_share_date() {
        let sql = format!(
            "INSERT INTO availability_windows VALUES \
             ('{BROKER}', '2030-01-15', '09:00', '12:00', 60, 0, 1), \
             ('{BROKER}', '2030-01-16', '09:00', '12:00', 60, 0, 1)"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_window_status() {
        let sql = format!("INSERT INTO window_status VALUES ('{BROKER}', false)");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::SetWindowStatus { is_available: false, .. }
        ));
    }

    #[test]
    fn parse_select_windows_range() {
        let sql = format!(
            "SELECT * FROM availability_windows WHERE broker_id = '{BROKER}' AND date >= '2030-01-01' AND date <= '2030-01-31'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectWindows { start_date, end_date, .. } => {
                assert_eq!(start_date, NaiveDate::from_ymd_opt(2030, 1, 1).unwrap());
                assert_eq!(end_date, NaiveDate::from_ymd_opt(2030, 1, 31).unwrap());
            }
            cmd => panic!("expected SelectWindows, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_delete_windows_for_date() {
        let sql = format!("DELETE FROM availability_windows WHERE broker_id = '{BROKER}' AND date = '2030-01-15'");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::ClearWindows { .. }));
    }

    #[test]
    fn parse_insert_blocked_period() {
        let sql = format!(
            r#"INSERT INTO blocked_periods (broker_id, start, "end", reason) VALUES ('{BROKER}', '2030-06-01T14:00:00+03:00', '2030-06-01T15:00:00+03:00', 'Lunch')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBlockedPeriod { start, end, reason, block_type, recurrence, created_by, .. } => {
                assert_eq!(end - start, 3_600_000);
                assert_eq!(reason.as_deref(), Some("Lunch"));
                assert_eq!(block_type, BlockType::Personal);
                assert_eq!(recurrence, None);
                assert_eq!(created_by, None);
            }
            cmd => panic!("expected InsertBlockedPeriod, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_recurring_blocked_period() {
        let sql = format!(
            r#"INSERT INTO blocked_periods VALUES ('{BROKER}', '2030-06-01T14:00:00Z', '2030-06-01T15:00:00Z', NULL, 'meeting', 'weekly', '2030-08-10T14:00:00Z', 'admin')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBlockedPeriod { block_type, recurrence, created_by, .. } => {
                assert_eq!(block_type, BlockType::Meeting);
                assert_eq!(recurrence.unwrap().pattern, RecurrencePattern::Weekly);
                assert_eq!(created_by.as_deref(), Some("admin"));
            }
            cmd => panic!("expected InsertBlockedPeriod, got {cmd:?}"),
        }
    }

    #[test]
    fn recurrence_needs_both_columns() {
        let sql = format!(
            r#"INSERT INTO blocked_periods VALUES ('{BROKER}', '2030-06-01T14:00:00Z', '2030-06-01T15:00:00Z', NULL, NULL, 'daily')"#
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn instant_without_offset_is_a_time_format_error() {
        let sql = format!(
            r#"INSERT INTO blocked_periods VALUES ('{BROKER}', '2030-06-01T14:00:00', '2030-06-01T15:00:00Z')"#
        );
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::Value(EngineError::InvalidTimeFormat(_)))
        ));
    }

    #[test]
    fn parse_select_blocked_with_range() {
        let sql = format!(
            r#"SELECT * FROM blocked_periods WHERE broker_id = '{BROKER}' AND start >= '2030-06-01T00:00:00Z' AND "end" <= '2030-06-02T00:00:00Z'"#
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectBlockedPeriods { start, end, .. } => {
                assert_eq!(end.unwrap() - start.unwrap(), 86_400_000);
            }
            cmd => panic!("expected SelectBlockedPeriods, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_delete_blocked_period() {
        let sql = format!("DELETE FROM blocked_periods WHERE id = '{BROKER}'");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::DeleteBlockedPeriod { .. }));
    }

    #[test]
    fn parse_available_slots() {
        let sql = format!("SELECT * FROM available_slots WHERE property_id = '{PROPERTY}' AND date = '2030-01-15'");
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailableSlots { property_id, broker_id, .. } => {
                assert_eq!(property_id.to_string(), PROPERTY);
                assert_eq!(broker_id, None);
            }
            cmd => panic!("expected SelectAvailableSlots, got {cmd:?}"),
        }
        let sql = format!(
            "SELECT * FROM available_slots WHERE property_id = '{PROPERTY}' AND date = '2030-01-15' AND broker_id = '{BROKER}'"
        );
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::SelectAvailableSlots { broker_id: Some(_), .. }
        ));
    }

    #[test]
    fn parse_capacity_reservation() {
        let sql = format!("INSERT INTO capacity_reservations (window_id) VALUES ('{BROKER}')");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::ReserveCapacity { .. }));
        let sql = format!("DELETE FROM capacity_reservations WHERE window_id = '{BROKER}'");
        assert!(matches!(parse_sql(&sql).unwrap(), Command::ReleaseCapacity { .. }));
    }

    #[test]
    fn parse_booking() {
        let sql = format!(
            "INSERT INTO bookings (id, availability_id, start, property_id, label) VALUES ('{BROKER}', '{BROKER}', '2030-01-15T09:00:00+02:00', '{PROPERTY}', 'Villa')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBooking { property_id, label, .. } => {
                assert_eq!(property_id.unwrap().to_string(), PROPERTY);
                assert_eq!(label.as_deref(), Some("Villa"));
            }
            cmd => panic!("expected InsertBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_dashboard() {
        let sql = format!("SELECT * FROM dashboard_summary WHERE broker_id = '{BROKER}' AND horizon_days = 14");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::SelectDashboard { horizon_days: Some(14), .. }
        ));
    }

    #[test]
    fn missing_filter_errors() {
        let sql = "SELECT * FROM available_slots WHERE date = '2030-01-15'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("property_id"))));
    }

    #[test]
    fn or_in_where_is_unsupported() {
        let sql = format!("DELETE FROM bookings WHERE id = '{BROKER}' OR id = '{PROPERTY}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO resources (id) VALUES ('{BROKER}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
