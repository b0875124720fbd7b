use thiserror::Error;
use ulid::Ulid;

use crate::model::{BlockedPeriod, Span};

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or ambiguous datetime. Nothing was persisted.
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),

    /// `end <= start`, or a start in the past.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The requested blocked period overlaps existing ones; all of them are returned.
    #[error("conflicts with {}", describe_conflicts(.conflicts))]
    Conflict { conflicts: Vec<BlockedPeriod> },

    #[error("capacity exceeded on window {window_id}: {max_bookings} of {max_bookings} booked")]
    CapacityExceeded { window_id: Ulid, max_bookings: u32 },

    #[error("not found: {0}")]
    NotFound(Ulid),

    #[error("window {0} has bookings; mark it unavailable instead of replacing it")]
    WindowHasBookings(Ulid),

    #[error("slot [{}, {}) is not bookable: {reason}", .span.start, .span.end)]
    SlotUnavailable { span: Span, reason: &'static str },

    #[error("booking already exists: {0}")]
    AlreadyExists(Ulid),

    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),

    /// Infrastructure failure; the only class that is safe to retry.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Storage(_))
    }
}

fn describe_conflicts(conflicts: &[BlockedPeriod]) -> String {
    let parts: Vec<String> = conflicts
        .iter()
        .map(|p| format!("{} [{}, {})", p.id, p.span.start, p.span.end))
        .collect();
    format!("{} blocked period(s): {}", conflicts.len(), parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockType, PeriodKind};

    #[test]
    fn conflict_message_lists_every_period() {
        let p = BlockedPeriod {
            id: Ulid::nil(),
            broker_id: Ulid::nil(),
            span: Span::new(100, 200),
            reason: None,
            block_type: BlockType::Meeting,
            kind: PeriodKind::Instance { template_id: None },
            created_by: None,
            created_at: 0,
        };
        let err = EngineError::Conflict { conflicts: vec![p.clone(), p] };
        let msg = err.to_string();
        assert!(msg.contains("2 blocked period(s)"));
        assert!(msg.contains("[100, 200)"));
    }

    #[test]
    fn only_storage_is_retryable() {
        assert!(EngineError::Storage("disk".into()).is_retryable());
        assert!(!EngineError::CapacityExceeded { window_id: Ulid::nil(), max_bookings: 1 }.is_retryable());
        assert!(!EngineError::Conflict { conflicts: vec![] }.is_retryable());
    }
}
