use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Per-session lifecycle. `Completed`, `Timeout`, and `Failed` are terminal:
/// once entered, no further transition is applied.
///
/// Grounded on `spec.md` §4.4's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Aggregating,
    Completed,
    Timeout,
    Failed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Timeout | Self::Failed)
    }
}

/// Snapshot of one fan-out/fan-in session's bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSession {
    pub session_id: Uuid,
    pub correlation_id: Uuid,
    pub total_strategies: u32,
    pub completed_strategies: u32,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub timeout_at: DateTime<Utc>,
}

impl AggregationSession {
    pub fn is_complete(&self) -> bool {
        self.completed_strategies >= self.total_strategies
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.timeout_at
    }
}
