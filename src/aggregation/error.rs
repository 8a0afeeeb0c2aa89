use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("no aggregation session {0}")]
    SessionNotFound(Uuid),

    #[error("allocation weights sum to {0}, must be 1 within 1e-9")]
    AllocationWeightsInvalid(Decimal),

    #[error("session {0} is already in a terminal state")]
    AlreadyTerminal(Uuid),

    #[error("session {0} reached its deadline before every strategy completed")]
    SessionTimedOut(Uuid),

    #[error("strategy {strategy_id} failed to evaluate: {reason}")]
    StrategyEvaluationFailed { strategy_id: String, reason: String },
}
