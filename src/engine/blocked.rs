use chrono_tz::Tz;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::time::nth_occurrence;

use super::conflict::{check_no_conflict, check_not_past, check_text, find_conflicts, now_ms, validate_span};
use super::{Engine, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlockedPeriod {
    pub broker_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub reason: Option<String>,
    pub block_type: BlockType,
    pub recurrence: Option<Recurrence>,
    pub created_by: Option<String>,
}

/// A generated instance that could not be persisted.
#[derive(Debug)]
pub struct InstanceFailure {
    pub span: Span,
    pub error: EngineError,
}

#[derive(Debug)]
pub struct BlockedOutcome {
    /// The requested period first, then every generated instance that was stored.
    pub created: Vec<BlockedPeriod>,
    pub failed: Vec<InstanceFailure>,
}

impl BlockedOutcome {
    pub fn base(&self) -> Option<&BlockedPeriod> {
        self.created.first()
    }
}

/// Spans of the instances a template generates, excluding the template itself.
/// Each keeps the template's duration; starts run while `<= until`.
pub fn expand_occurrences(base: Span, recurrence: Recurrence, tz: Tz) -> Result<Vec<Span>, EngineError> {
    let duration = base.duration_ms();
    let mut spans = Vec::new();
    for k in 1u32.. {
        let Some(start) = nth_occurrence(base.start, k, recurrence.pattern, tz) else {
            break;
        };
        if start > recurrence.until {
            break;
        }
        if spans.len() >= MAX_RECURRENCE_INSTANCES {
            return Err(EngineError::LimitExceeded("too many recurring instances"));
        }
        spans.push(Span::new(start, start + duration));
    }
    Ok(spans)
}

impl Engine {
    /// Create a blocked period, and if it recurs, its generated instances.
    ///
    /// The requested period is all-or-nothing: any overlap with the broker's
    /// existing periods rejects it with every conflicting period attached.
    /// Generated instances are checked one by one against everything stored
    /// so far (earlier siblings included); an instance that overlaps is
    /// reported in `failed` and the rest carry on.
    pub async fn create_blocked_period(&self, req: NewBlockedPeriod) -> Result<BlockedOutcome, EngineError> {
        let span = Span::checked(req.start, req.end).ok_or_else(|| {
            EngineError::InvalidRange(format!("end ({}) must be after start ({})", req.end, req.start))
        })?;
        validate_span(&span)?;
        check_text(&req.reason, MAX_REASON_LEN, "reason too long")?;
        check_text(&req.created_by, MAX_CREATED_BY_LEN, "created_by too long")?;

        let tz = self.broker_profile(req.broker_id).await?.tz()?;
        let now = now_ms();
        check_not_past(span.start, now, tz)?;

        let occurrences = match req.recurrence {
            Some(r) if r.until <= span.start => {
                return Err(EngineError::InvalidRange(
                    "recurring_until must be after the start".into(),
                ));
            }
            Some(r) => expand_occurrences(span, r, tz)?,
            None => Vec::new(),
        };

        let mut guard = self.lock_broker(req.broker_id).await;
        if guard.blocked.len() >= MAX_BLOCKED_PERIODS_PER_BROKER {
            return Err(EngineError::LimitExceeded("too many blocked periods for broker"));
        }
        if let Err(e) = check_no_conflict(&guard, &span) {
            warn!("blocked period for broker {} rejected: {e}", req.broker_id);
            metrics::counter!(crate::observability::BLOCKED_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let base = BlockedPeriod {
            id: Ulid::new(),
            broker_id: req.broker_id,
            span,
            reason: req.reason.clone(),
            block_type: req.block_type,
            kind: match req.recurrence {
                Some(r) => PeriodKind::Template(r),
                None => PeriodKind::Instance { template_id: None },
            },
            created_by: req.created_by.clone(),
            created_at: now,
        };
        let template_id = base.id;
        self.persist_and_apply(&mut guard, &Event::BlockedPeriodCreated { period: base.clone() })
            .await?;

        let mut outcome = BlockedOutcome {
            created: vec![base],
            failed: Vec::new(),
        };

        for occurrence in occurrences {
            if guard.blocked.len() >= MAX_BLOCKED_PERIODS_PER_BROKER {
                outcome.failed.push(InstanceFailure {
                    span: occurrence,
                    error: EngineError::LimitExceeded("too many blocked periods for broker"),
                });
                continue;
            }
            let conflicts = find_conflicts(&guard, &occurrence);
            if !conflicts.is_empty() {
                warn!(
                    "recurring instance {}..{} of {template_id} skipped: {} conflict(s)",
                    occurrence.start,
                    occurrence.end,
                    conflicts.len()
                );
                outcome.failed.push(InstanceFailure {
                    span: occurrence,
                    error: EngineError::Conflict { conflicts },
                });
                continue;
            }
            let instance = BlockedPeriod {
                id: Ulid::new(),
                broker_id: req.broker_id,
                span: occurrence,
                reason: req.reason.clone(),
                block_type: req.block_type,
                kind: PeriodKind::Instance {
                    template_id: Some(template_id),
                },
                created_by: req.created_by.clone(),
                created_at: now,
            };
            let event = Event::BlockedPeriodCreated { period: instance.clone() };
            match self.persist_and_apply(&mut guard, &event).await {
                Ok(()) => outcome.created.push(instance),
                Err(error) => {
                    warn!("recurring instance of {template_id} not stored: {error}");
                    outcome.failed.push(InstanceFailure { span: occurrence, error });
                }
            }
        }

        info!(
            "blocked period {template_id} created for broker {} ({} stored, {} failed)",
            req.broker_id,
            outcome.created.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }

    /// Periods of a broker intersecting `range` (all of them if `None`), ascending by start.
    pub async fn list_blocked_periods(
        &self,
        broker_id: Ulid,
        range: Option<Span>,
    ) -> Result<Vec<BlockedPeriod>, EngineError> {
        self.broker_profile(broker_id).await?;
        let Some(rs) = self.get_schedule(&broker_id) else {
            return Ok(Vec::new());
        };
        let guard = rs.read().await;
        let periods = match range {
            Some(r) => guard.blocked_overlapping(&r).cloned().collect(),
            None => guard.blocked.clone(),
        };
        Ok(periods)
    }

    /// Hard delete. Instances generated from a template are independent
    /// periods and stay in place when the template is deleted.
    pub async fn delete_blocked_period(&self, id: Ulid) -> Result<BlockedPeriod, EngineError> {
        let (broker_id, mut guard) = self.resolve_entity_write(&id).await?;
        let period = guard
            .blocked
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        let event = Event::BlockedPeriodDeleted { id, broker_id };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("blocked period {id} deleted for broker {broker_id}");
        Ok(period)
    }
}
